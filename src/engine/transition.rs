//! The state graph.
//!
//! `next` maps (active state, classification, memory) to a [`Step`]. It
//! never mutates anything; the engine applies the step's deltas afterwards.
//! `Crisis` and `Quit` never reach this function, and any pair it does not
//! list is an [`EngineError::InvalidStateTransition`].

use crate::classifier::{Category, Classification, EscapePattern};
use crate::engine::{Engine, Step};
use crate::error::EngineError;
use crate::memory::{MemoryDelta, SessionMemory};
use crate::sensation_tree::{echo_phrase, Domain};
use crate::state::State;

/// 0-based index of the orientation safety screen.
const SAFETY_SCREEN_INDEX: usize = 1;

/// The only answer the safety screen accepts.
const SAFETY_ANSWER: &str = "yes";

pub(crate) fn next(
    engine: &Engine,
    classification: &Classification,
    memory: &SessionMemory,
) -> Result<Step, EngineError> {
    let from = memory.current_state();
    let category = classification.category;
    let invalid = || EngineError::InvalidStateTransition { from, category };

    // Rejected input re-presents the prompt and changes nothing.
    if category == Category::Unclear && !from.accepts_any_input() && from != State::Entry {
        return engine.represent(memory);
    }

    let script = engine.script();
    let prompts = &script.prompts;
    let config = engine.config();

    let step = match (from, category) {
        (State::Entry, _) => engine.present(engine.opening_state(memory), memory)?,

        // -------------------------------------------------------------------
        // Orientation and routing
        // -------------------------------------------------------------------
        (State::Orientation, Category::Affirm) => {
            let index = memory.orientation_screen_index();
            if index == SAFETY_SCREEN_INDEX && classification.normalized != SAFETY_ANSWER {
                return engine.represent(memory);
            }
            let next_index = index + 1;
            if next_index >= script.orientation_len() {
                Step::to(State::Routing, script.routing(memory.returning_user()))
                    .with(MemoryDelta::AdvanceOrientation)
            } else {
                Step::to(State::Orientation, engine.orientation_text(next_index)?)
                    .with(MemoryDelta::AdvanceOrientation)
            }
        }
        (State::Orientation, _) => engine.represent(memory)?,

        (State::Routing, Category::ForcedChoice(1)) => {
            Step::to(State::MirrorCentralView, prompts.central_view.as_str())
                .with(MemoryDelta::MarkMirrorEngaged)
                .with(MemoryDelta::StartEpisode)
        }
        (State::Routing, Category::ForcedChoice(2)) => {
            Step::to(State::Orientation, engine.orientation_text(0)?)
                .with(MemoryDelta::RestartOrientation)
        }

        // -------------------------------------------------------------------
        // Mirror Mode
        // -------------------------------------------------------------------
        (State::MirrorCentralView | State::SpaciousWhatsHere, Category::Story(pattern)) => {
            redirect(engine, memory, pattern)
        }
        (
            State::MirrorCentralView | State::SpaciousWhatsHere,
            Category::SensationReport | Category::Affirm,
        ) => Step::to(State::SensationDomain, script.domain_menu()).with(MemoryDelta::StartEpisode),

        // -------------------------------------------------------------------
        // Sensation tree
        // -------------------------------------------------------------------
        (State::SensationDomain, Category::ForcedChoice(n)) => {
            let domain = Domain::at(n).ok_or_else(invalid)?;
            let step = if domain.is_leaf() {
                Step::to(State::ClenchChoice, prompts.clench_question.as_str())
            } else {
                Step::to(
                    State::SensationRefinement(domain),
                    script.refinement_menu(domain),
                )
            };
            step.with(MemoryDelta::PushPath(domain.key().to_string()))
        }
        (State::SensationRefinement(domain), Category::ForcedChoice(n)) => {
            let refinement = domain.refinement_at(n).ok_or_else(invalid)?;
            let text = format!(
                "{}\n\n{}",
                script.echo(&echo_phrase(domain, refinement)),
                prompts.clench_question
            );
            Step::to(State::ClenchChoice, text)
                .with(MemoryDelta::PushPath(refinement.to_string()))
        }

        // -------------------------------------------------------------------
        // Clench path
        // -------------------------------------------------------------------
        (State::ClenchChoice, Category::ForcedChoice(1 | 2)) => {
            Step::to(State::SensoryFork, prompts.clench_instruction.as_str())
                .hold(config.contact_hold_secs)
        }
        (State::ClenchChoice, Category::ForcedChoice(3)) => {
            Step::to(State::SensoryFork, prompts.raw_sensation.as_str())
                .hold(config.contact_hold_secs)
        }

        // -------------------------------------------------------------------
        // Sensory fork
        // -------------------------------------------------------------------
        (State::SensoryFork, Category::ForcedChoice(1)) => {
            let layer = memory.layer_index();
            if layer >= config.dense_layer_count {
                Step::to(State::DenseContinueOrStop, prompts.continue_or_stop.as_str())
            } else {
                Step::to(State::DenseLayer, engine.dense_text(layer + 1)?)
                    .with(MemoryDelta::EnterDenseLayer)
                .hold(config.dense_hold_secs)
            }
        }
        (State::SensoryFork, Category::ForcedChoice(2)) => {
            // Eligibility counts the stays completed before this one.
            let eligible = memory.successful_stays_count() >= config.spaciousness_check_threshold
                && !memory.spaciousness_check_done();
            let step = if eligible {
                log::info!(
                    "spaciousness check after {} stays",
                    memory.successful_stays_count()
                );
                Step::to(
                    State::SpaciousnessCheck1,
                    prompts.spaciousness_check_1.as_str(),
                )
                .with(MemoryDelta::MarkSpaciousnessCheck)
            } else {
                Step::to(State::SpaciousSilence, prompts.spacious_stay.as_str())
                    .hold(config.spacious_hold_secs)
            };
            step.with(MemoryDelta::LeaveDensePath)
                .with(MemoryDelta::RecordSpaciousStay)
        }
        (State::SensoryFork, Category::ForcedChoice(3)) => Step::to(
            State::MirrorCentralView,
            format!("{}\n\n{}", prompts.no_change, prompts.central_view),
        )
        .with(MemoryDelta::LeaveDensePath),

        // -------------------------------------------------------------------
        // Dense layers
        // -------------------------------------------------------------------
        (State::DenseLayer, _) => Step::to(State::SensoryFork, prompts.sensory_fork.as_str()),
        (State::DenseContinueOrStop, Category::ForcedChoice(1)) => {
            Step::to(State::MirrorCentralView, prompts.central_view.as_str())
                .with(MemoryDelta::LeaveDensePath)
                .with(MemoryDelta::StartEpisode)
        }
        (State::DenseContinueOrStop, Category::ForcedChoice(2)) => engine.end_session(memory),

        // -------------------------------------------------------------------
        // Spacious path and spaciousness check
        // -------------------------------------------------------------------
        (State::SpaciousSilence, _) => {
            Step::to(State::SpaciousWhatsHere, prompts.whats_here_now.as_str())
        }
        (State::SpaciousnessCheck1, Category::ForcedChoice(1)) => Step::to(
            State::SpaciousnessCheck2,
            prompts.spaciousness_check_2.as_str(),
        ),
        (State::SpaciousnessCheck1, Category::ForcedChoice(2 | 3)) => {
            Step::to(State::SpaciousSilence, prompts.spaciousness_fallback.as_str())
                .hold(config.spacious_hold_secs)
        }
        (State::SpaciousnessCheck2, _) => {
            Step::to(State::SpaciousnessSilence, "").hold(config.spaciousness_hold_secs)
        }
        (State::SpaciousnessSilence, _) => {
            Step::to(State::MirrorCentralView, prompts.central_view.as_str())
        }

        // -------------------------------------------------------------------
        // Crisis response
        // -------------------------------------------------------------------
        (State::CrisisResponse, Category::ForcedChoice(1)) => {
            let target = memory.resume_state().unwrap_or_else(|| fallback_resume(engine, memory));
            log::info!("resuming at {} after crisis response", target);
            let mut step = engine.present(target, memory)?;
            step.deltas.push(MemoryDelta::TakeResume);
            step
        }
        (State::CrisisResponse, Category::ForcedChoice(2)) => engine.end_session(memory),

        _ => return Err(invalid()),
    };
    Ok(step)
}

/// Story redirect: name the pattern, clear the episode, ask again.
fn redirect(engine: &Engine, memory: &SessionMemory, pattern: EscapePattern) -> Step {
    let script = engine.script();
    let first_time = !memory.has_explained(pattern);
    let text = format!(
        "{}\n\n{}",
        script.redirect(pattern, first_time),
        script.prompts.central_view
    );
    let step = Step::to(State::MirrorCentralView, text).with(MemoryDelta::StartEpisode);
    if first_time {
        step.with(MemoryDelta::MarkPatternExplained(pattern))
    } else {
        step
    }
}

/// Resume target for a crisis response with no recorded prior state.
fn fallback_resume(engine: &Engine, memory: &SessionMemory) -> State {
    if memory.mirror_engaged() {
        State::MirrorCentralView
    } else {
        engine.opening_state(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_detailed;
    use crate::config::EngineConfig;
    use crate::memory::MAX_DENSE_LAYERS;

    fn memory_at(state: State) -> SessionMemory {
        let mut memory = SessionMemory::new();
        memory
            .apply_all(
                &[MemoryDelta::MarkMirrorEngaged, MemoryDelta::SetState(state)],
                MAX_DENSE_LAYERS,
            )
            .unwrap();
        memory
    }

    fn step(engine: &Engine, state: State, utterance: &str) -> Result<Step, EngineError> {
        let memory = memory_at(state);
        next(engine, &classify_detailed(utterance, state), &memory)
    }

    #[test]
    fn test_undefined_pairs_are_rejected() {
        let engine = Engine::default();
        let memory = memory_at(State::Routing);
        let fake = Classification {
            category: Category::SensationReport,
            normalized: "tight chest".to_string(),
            evidence: Default::default(),
        };
        let err = next(&engine, &fake, &memory).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidStateTransition {
                from: State::Routing,
                category: Category::SensationReport,
            }
        );
    }

    #[test]
    fn test_out_of_range_choice_is_rejected() {
        let engine = Engine::default();
        let memory = memory_at(State::SensationDomain);
        let fake = Classification {
            category: Category::ForcedChoice(11),
            normalized: "11".to_string(),
            evidence: Default::default(),
        };
        assert!(next(&engine, &fake, &memory).is_err());
    }

    #[test]
    fn test_redirect_marks_pattern_once() {
        let engine = Engine::default();
        let first = step(&engine, State::MirrorCentralView, "what should I do").unwrap();
        assert!(first
            .deltas
            .contains(&MemoryDelta::MarkPatternExplained(EscapePattern::ProblemSolving)));
        assert!(first.deltas.contains(&MemoryDelta::StartEpisode));
        assert!(first.text.starts_with("That's Problem-Solving:"));
    }

    #[test]
    fn test_whats_here_accepts_sensation() {
        let engine = Engine::default();
        let s = step(&engine, State::SpaciousWhatsHere, "warm belly").unwrap();
        assert_eq!(s.next, State::SensationDomain);
    }

    #[test]
    fn test_custom_threshold() {
        let config = EngineConfig {
            spaciousness_check_threshold: 0,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        let s = step(&engine, State::SensoryFork, "2").unwrap();
        assert_eq!(s.next, State::SpaciousnessCheck1);
    }

    #[test]
    fn test_silence_states_accept_empty_input() {
        let engine = Engine::default();
        assert_eq!(
            step(&engine, State::SpaciousSilence, "").unwrap().next,
            State::SpaciousWhatsHere
        );
        assert_eq!(
            step(&engine, State::SpaciousnessSilence, "").unwrap().next,
            State::MirrorCentralView
        );
        assert_eq!(
            step(&engine, State::DenseLayer, "").unwrap().next,
            State::SensoryFork
        );
    }

    #[test]
    fn test_crisis_resume_without_record_falls_back() {
        let engine = Engine::default();
        let s = step(&engine, State::CrisisResponse, "1").unwrap();
        assert_eq!(s.next, State::MirrorCentralView);
    }
}
