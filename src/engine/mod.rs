//! The conversation engine.
//!
//! [`Engine::take_turn`] is the whole turn protocol: classify the utterance
//! against the active state, pick the edge of the state graph, apply the
//! resulting memory deltas to a copy of the caller's memory, and return the
//! next state, the text to show and the updated memory in one [`Turn`].
//!
//! Two categories preempt the graph in every live state: `Crisis` routes to
//! the crisis response (remembering where to resume) and `Quit` ends the
//! session. Everything else is decided by [`transition::next`].
//!
//! A turn is atomic. If the graph has no edge for the (state, category)
//! pair, or a delta would break a memory invariant, the turn fails with an
//! [`EngineError`] and the caller's memory is untouched.

mod transition;

use serde::Serialize;

use crate::classifier::{classify_detailed, Category, Classification};
use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError};
use crate::memory::{MemoryDelta, SessionMemory};
use crate::state::State;
use crate::translations::Script;

/// Out-of-band event for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostSignal {
    /// Crisis vocabulary was detected; the host should surface its own
    /// crisis resources.
    Crisis,
    /// The session ended after Mirror Mode; the off-app practice text was
    /// shown.
    OffAppHandoff,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub category: Category,
    pub next_state: State,
    pub display_text: String,
    pub memory: SessionMemory,
    pub signal: Option<HostSignal>,
    /// How long the driver should wait for input before submitting an empty
    /// utterance on the user's behalf.
    pub hold_secs: Option<u64>,
}

/// An edge of the state graph, before it is applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub next: State,
    pub text: String,
    pub deltas: Vec<MemoryDelta>,
    pub signal: Option<HostSignal>,
    pub hold_secs: Option<u64>,
}

impl Step {
    pub fn to(next: State, text: impl Into<String>) -> Self {
        Self {
            next,
            text: text.into(),
            deltas: Vec::new(),
            signal: None,
            hold_secs: None,
        }
    }

    pub fn with(mut self, delta: MemoryDelta) -> Self {
        self.deltas.push(delta);
        self
    }

    pub fn hold(mut self, secs: u64) -> Self {
        self.hold_secs = Some(secs);
        self
    }

    pub fn signal(mut self, signal: HostSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Deterministic Mirror Mode engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    script: Script,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            script: Script::embedded().clone(),
        }
    }
}

impl Engine {
    /// Engine with the embedded English script.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_script(config, Script::embedded().clone())
    }

    /// Engine with a custom script. The configuration is validated here, so
    /// hand-built configs get the same checks as YAML ones.
    pub fn with_script(config: EngineConfig, script: Script) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, script })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Open or resume a session without user input.
    ///
    /// From `ENTRY` this takes the opening edge (orientation for a new user,
    /// routing for a returning one). In any other live state it re-presents
    /// the current prompt unchanged, which is how a stored session resumes.
    pub fn open(&self, memory: &SessionMemory) -> Result<Turn, EngineError> {
        let state = memory.current_state();
        match state {
            State::Entry => self.take_turn("", memory),
            State::SessionEnd => Err(EngineError::InvalidStateTransition {
                from: state,
                category: Category::Unclear,
            }),
            _ => {
                let step = self.represent(memory)?;
                Ok(Turn {
                    category: Category::Unclear,
                    next_state: step.next,
                    display_text: step.text,
                    memory: memory.clone(),
                    signal: step.signal,
                    hold_secs: step.hold_secs,
                })
            }
        }
    }

    /// Run one turn.
    pub fn take_turn(&self, utterance: &str, memory: &SessionMemory) -> Result<Turn, EngineError> {
        let from = memory.current_state();
        let classification = classify_detailed(utterance, from);
        let category = classification.category;

        let step = match self.decide(&classification, memory) {
            Ok(step) => step,
            Err(err) => {
                log::warn!("turn rejected in {}: {}", from, err);
                return Err(err);
            }
        };

        let mut updated = memory.clone();
        let mut deltas = step.deltas;
        deltas.push(MemoryDelta::SetState(step.next));
        if let Err(err) = updated.apply_all(&deltas, self.config.dense_layer_count) {
            log::warn!("turn rejected in {}: {}", from, err);
            return Err(err);
        }

        log::debug!("transition {} --{}--> {}", from, category, step.next);
        if from.phase() != step.next.phase() {
            log::info!("phase {:?} -> {:?}", from.phase(), step.next.phase());
        }
        if step.next == State::SessionEnd {
            log::info!("session ended from {}", from);
        }

        Ok(Turn {
            category,
            next_state: step.next,
            display_text: step.text,
            memory: updated,
            signal: step.signal,
            hold_secs: step.hold_secs,
        })
    }

    fn decide(
        &self,
        classification: &Classification,
        memory: &SessionMemory,
    ) -> Result<Step, EngineError> {
        let from = memory.current_state();
        if from.is_terminal() {
            return Err(EngineError::InvalidStateTransition {
                from,
                category: classification.category,
            });
        }
        match classification.category {
            Category::Crisis => self.crisis(memory),
            Category::Quit => Ok(self.end_session(memory)),
            _ => transition::next(self, classification, memory),
        }
    }

    // -----------------------------------------------------------------------
    // Preemptive edges
    // -----------------------------------------------------------------------

    fn crisis(&self, memory: &SessionMemory) -> Result<Step, EngineError> {
        let from = memory.current_state();
        log::info!("crisis language detected in {}", from);
        let step = self.present(State::CrisisResponse, memory)?;
        if from == State::CrisisResponse {
            return Ok(step);
        }
        let resume = if from == State::Entry {
            self.opening_state(memory)
        } else {
            from
        };
        Ok(step.with(MemoryDelta::SetResume(resume)))
    }

    /// End the session. The off-app practice text is shown once, and only
    /// when the session did not come through the crisis response.
    pub(crate) fn end_session(&self, memory: &SessionMemory) -> Step {
        let prompts = &self.script.prompts;
        let mut step = Step::to(State::SessionEnd, prompts.completion.as_str())
            .with(MemoryDelta::TakeResume);
        let after_crisis = memory.current_state() == State::CrisisResponse;
        if memory.mirror_engaged() && !memory.offapp_given() && !after_crisis {
            step.text = format!("{}\n\n{}", prompts.offapp_handoff, prompts.completion);
            step.signal = Some(HostSignal::OffAppHandoff);
            step.deltas.push(MemoryDelta::MarkHandoffGiven);
        }
        step
    }

    // -----------------------------------------------------------------------
    // Prompts
    // -----------------------------------------------------------------------

    /// Where a session goes from `ENTRY`.
    pub(crate) fn opening_state(&self, memory: &SessionMemory) -> State {
        if memory.returning_user() {
            State::Routing
        } else {
            State::Orientation
        }
    }

    /// Re-present the current state's prompt with no memory change.
    pub(crate) fn represent(&self, memory: &SessionMemory) -> Result<Step, EngineError> {
        let state = memory.current_state();
        self.present(state, memory)
    }

    /// Text of a 0-based orientation screen.
    pub(crate) fn orientation_text(&self, index: usize) -> Result<String, EngineError> {
        self.script
            .orientation_screen(index)
            .ok_or_else(|| EngineError::InvalidMemory {
                field: "orientation_screen_index",
                reason: format!("no orientation screen {}", index),
            })
    }

    /// Text of a 1-based dense layer.
    pub(crate) fn dense_text(&self, layer: u8) -> Result<&str, EngineError> {
        self.script
            .dense_layer(layer)
            .ok_or_else(|| EngineError::InvalidMemory {
                field: "layer_index",
                reason: format!("no dense layer {}", layer),
            })
    }

    /// The prompt (and hold) shown on arriving in `state`.
    pub(crate) fn present(&self, state: State, memory: &SessionMemory) -> Result<Step, EngineError> {
        let script = &self.script;
        let prompts = &script.prompts;
        let step = match state {
            State::Entry => Step::to(state, ""),
            State::Orientation => {
                Step::to(state, self.orientation_text(memory.orientation_screen_index())?)
            }
            State::Routing => Step::to(state, script.routing(memory.returning_user())),
            State::MirrorCentralView => Step::to(state, prompts.central_view.as_str()),
            State::SensationDomain => Step::to(state, script.domain_menu()),
            State::SensationRefinement(domain) => Step::to(state, script.refinement_menu(domain)),
            State::ClenchChoice => Step::to(state, prompts.clench_question.as_str()),
            State::SensoryFork => Step::to(state, prompts.sensory_fork.as_str()),
            State::DenseLayer => Step::to(state, self.dense_text(memory.layer_index())?)
                .hold(self.config.dense_hold_secs),
            State::DenseContinueOrStop => Step::to(state, prompts.continue_or_stop.as_str()),
            State::SpaciousSilence => Step::to(state, prompts.spacious_stay.as_str())
                .hold(self.config.spacious_hold_secs),
            State::SpaciousWhatsHere => Step::to(state, prompts.whats_here_now.as_str()),
            State::SpaciousnessCheck1 => Step::to(state, prompts.spaciousness_check_1.as_str()),
            State::SpaciousnessCheck2 => Step::to(state, prompts.spaciousness_check_2.as_str()),
            State::SpaciousnessSilence => {
                Step::to(state, "").hold(self.config.spaciousness_hold_secs)
            }
            State::CrisisResponse => {
                Step::to(state, prompts.crisis.as_str()).signal(HostSignal::Crisis)
            }
            State::SessionEnd => Step::to(state, prompts.completion.as_str()),
        };
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EscapePattern;
    use crate::sensation_tree::Domain;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn run(engine: &Engine, memory: SessionMemory, inputs: &[&str]) -> SessionMemory {
        inputs.iter().fold(memory, |memory, input| {
            engine
                .take_turn(input, &memory)
                .unwrap_or_else(|e| panic!("turn {:?} failed: {}", input, e))
                .memory
        })
    }

    /// New user, opened, through orientation, into Mirror Mode.
    fn in_mirror_mode(engine: &Engine) -> SessionMemory {
        let opened = engine.open(&SessionMemory::new()).unwrap().memory;
        let mut inputs = vec!["YES"; 13];
        inputs.push("1");
        run(engine, opened, &inputs)
    }

    const SPACIOUS_STAY: [&str; 6] = ["tightness in my chest", "1", "1", "1", "2", ""];

    #[test]
    fn test_open_new_user_shows_first_screen() {
        let engine = engine();
        let turn = engine.open(&SessionMemory::new()).unwrap();
        assert_eq!(turn.next_state, State::Orientation);
        assert!(turn.display_text.contains("(1/13)"));
        assert_eq!(turn.memory.orientation_screen_index(), 0);
    }

    #[test]
    fn test_open_returning_user_goes_to_routing() {
        let engine = engine();
        let turn = engine.open(&SessionMemory::returning()).unwrap();
        assert_eq!(turn.next_state, State::Routing);
        assert!(turn.display_text.starts_with("Welcome back."));
    }

    #[test]
    fn test_thirteen_yes_reach_routing_once() {
        let engine = engine();
        let mut memory = engine.open(&SessionMemory::new()).unwrap().memory;
        let mut seen = Vec::new();
        for _ in 0..13 {
            let turn = engine.take_turn("YES", &memory).unwrap();
            seen.push((turn.next_state, turn.memory.orientation_screen_index()));
            memory = turn.memory;
        }
        assert_eq!(memory.current_state(), State::Routing);
        let routing_turns = seen.iter().filter(|(s, _)| *s == State::Routing).count();
        assert_eq!(routing_turns, 1);
        let indices: Vec<usize> = seen.iter().map(|(_, i)| *i).collect();
        assert_eq!(indices, (1..=13).collect::<Vec<_>>());
    }

    #[test]
    fn test_safety_screen_needs_literal_yes() {
        let engine = engine();
        let memory = run(&engine, engine.open(&SessionMemory::new()).unwrap().memory, &["yes"]);
        assert_eq!(memory.orientation_screen_index(), 1);
        let turn = engine.take_turn("ok", &memory).unwrap();
        assert_eq!(turn.memory, memory);
        let turn = engine.take_turn("Yes.", &memory).unwrap();
        assert_eq!(turn.memory.orientation_screen_index(), 2);
    }

    #[test]
    fn test_orientation_rejects_other_input() {
        let engine = engine();
        let memory = engine.open(&SessionMemory::new()).unwrap().memory;
        let turn = engine.take_turn("my chest is tight", &memory).unwrap();
        assert_eq!(turn.memory, memory);
        assert!(turn.display_text.contains("(1/13)"));
    }

    #[test]
    fn test_routing_review_restarts_orientation() {
        let engine = engine();
        let memory = run(&engine, SessionMemory::returning(), &["", "2"]);
        assert_eq!(memory.current_state(), State::Orientation);
        assert_eq!(memory.orientation_screen_index(), 0);
    }

    #[test]
    fn test_story_redirect_stays_in_mirror_mode() {
        let engine = engine();
        let memory = in_mirror_mode(&engine);
        assert!(memory.mirror_engaged());
        let turn = engine
            .take_turn("my boss is getting on my nerves and I am so angry", &memory)
            .unwrap();
        assert_eq!(turn.category, Category::Story(EscapePattern::Story));
        assert_eq!(turn.next_state, State::MirrorCentralView);
        assert!(turn.display_text.starts_with("That's Story:"));
        assert!(turn.memory.has_explained(EscapePattern::Story));

        let again = engine.take_turn("it happened yesterday", &turn.memory).unwrap();
        assert!(again.display_text.starts_with("Story."));
    }

    #[test]
    fn test_sensation_path_lands_in_dense_layer_one() {
        let engine = engine();
        let memory = run(
            &engine,
            in_mirror_mode(&engine),
            &["tightness in my chest", "1", "1", "1", "1"],
        );
        assert_eq!(memory.current_state(), State::DenseLayer);
        assert_eq!(memory.layer_index(), 1);
        assert_eq!(memory.sensation_tree_path(), ["pressure", "Tight"]);
    }

    #[test]
    fn test_clench_turn_carries_contact_hold() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1", "1"]);
        assert_eq!(memory.current_state(), State::ClenchChoice);
        let turn = engine.take_turn("3", &memory).unwrap();
        assert_eq!(turn.next_state, State::SensoryFork);
        assert_eq!(turn.hold_secs, Some(75));
        assert!(turn.display_text.starts_with("That's okay."));

        // Silence after the hold re-presents the fork question.
        let fork = engine.take_turn("", &turn.memory).unwrap();
        assert_eq!(fork.next_state, State::SensoryFork);
        assert_eq!(fork.memory, turn.memory);
        assert!(fork.display_text.starts_with("As you stayed with it"));
    }

    #[test]
    fn test_neutral_domain_skips_refinement() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["numb", "10"]);
        assert_eq!(memory.current_state(), State::ClenchChoice);
        assert_eq!(memory.sensation_tree_path(), ["neutral"]);
    }

    #[test]
    fn test_dense_layers_climb_then_offer_stop() {
        let engine = engine();
        let mut memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1", "1", "1"]);
        for layer in 1..=4u8 {
            let turn = engine.take_turn("1", &memory).unwrap();
            assert_eq!(turn.next_state, State::DenseLayer);
            assert_eq!(turn.memory.layer_index(), layer);
            assert_eq!(turn.hold_secs, Some(60));
            memory = run(&engine, turn.memory, &[""]);
            assert_eq!(memory.current_state(), State::SensoryFork);
        }
        let offer = engine.take_turn("more dense", &memory).unwrap();
        assert_eq!(offer.next_state, State::DenseContinueOrStop);
        assert_eq!(offer.memory.layer_index(), 4);

        let resumed = engine.take_turn("1", &offer.memory).unwrap();
        assert_eq!(resumed.next_state, State::MirrorCentralView);
        assert_eq!(resumed.memory.layer_index(), 0);
        assert!(resumed.memory.sensation_tree_path().is_empty());

        let stopped = engine.take_turn("2", &offer.memory).unwrap();
        assert_eq!(stopped.next_state, State::SessionEnd);
        assert_eq!(stopped.signal, Some(HostSignal::OffAppHandoff));
    }

    #[test]
    fn test_less_dense_goes_straight_to_silence() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1", "1", "1", "1"]);
        assert_eq!(memory.layer_index(), 1);
        let memory = run(&engine, memory, &[""]);
        let turn = engine.take_turn("2", &memory).unwrap();
        assert_eq!(turn.next_state, State::SpaciousSilence);
        assert_eq!(turn.memory.successful_stays_count(), 1);
        assert_eq!(turn.memory.layer_index(), 0);
        assert_eq!(turn.hold_secs, Some(60));

        let whats_here = engine.take_turn("", &turn.memory).unwrap();
        assert_eq!(whats_here.next_state, State::SpaciousWhatsHere);
        assert_eq!(whats_here.display_text, "What's here now?");
    }

    #[test]
    fn test_no_change_returns_to_mirror_without_counting() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1", "1", "1", "3"]);
        assert_eq!(memory.current_state(), State::MirrorCentralView);
        assert_eq!(memory.successful_stays_count(), 0);
    }

    #[test]
    fn test_spaciousness_check_fires_on_fourth_stay_only() {
        let engine = engine();
        let mut memory = in_mirror_mode(&engine);
        for stay in 1..=3u32 {
            memory = run(&engine, memory, &SPACIOUS_STAY);
            assert_eq!(memory.current_state(), State::SpaciousWhatsHere);
            assert_eq!(memory.successful_stays_count(), stay);
            assert!(!memory.spaciousness_check_done());
        }

        let fourth = run(&engine, memory, &SPACIOUS_STAY[..4]);
        let turn = engine.take_turn("2", &fourth).unwrap();
        assert_eq!(turn.next_state, State::SpaciousnessCheck1);
        assert!(turn.memory.spaciousness_check_done());
        assert_eq!(turn.memory.successful_stays_count(), 4);

        let memory = run(&engine, turn.memory, &["1", "there's just sensation", ""]);
        assert_eq!(memory.current_state(), State::MirrorCentralView);

        // Fifth stay: eligible by count, but the check already ran.
        let fifth = run(&engine, memory, &SPACIOUS_STAY[..5]);
        assert_eq!(fifth.current_state(), State::SpaciousSilence);
        assert_eq!(fifth.successful_stays_count(), 5);
    }

    #[test]
    fn test_spaciousness_check_fallback_returns_to_silence() {
        let engine = engine();
        let mut memory = in_mirror_mode(&engine);
        for _ in 0..3 {
            memory = run(&engine, memory, &SPACIOUS_STAY);
        }
        let memory = run(&engine, memory, &SPACIOUS_STAY[..5]);
        assert_eq!(memory.current_state(), State::SpaciousnessCheck1);
        let turn = engine.take_turn("only contraction", &memory).unwrap();
        assert_eq!(turn.next_state, State::SpaciousSilence);
        assert_eq!(turn.display_text, "That's fine. Stay with what's here.");
        assert_eq!(turn.hold_secs, Some(60));
        assert!(turn.memory.spaciousness_check_done());
    }

    #[test]
    fn test_spaciousness_silence_emits_nothing() {
        let engine = engine();
        let mut memory = in_mirror_mode(&engine);
        for _ in 0..3 {
            memory = run(&engine, memory, &SPACIOUS_STAY);
        }
        let memory = run(&engine, memory, &SPACIOUS_STAY[..5]);
        let memory = run(&engine, memory, &["1"]);
        let turn = engine.take_turn("I'm not sure who is feeling it", &memory).unwrap();
        assert_eq!(turn.next_state, State::SpaciousnessSilence);
        assert_eq!(turn.display_text, "");
        assert_eq!(turn.hold_secs, Some(60));
    }

    #[test]
    fn test_unclear_in_forced_choice_is_idempotent() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1", "1", "1"]);
        assert_eq!(memory.current_state(), State::SensoryFork);
        for input in ["4", "purple", "it got a bit more dense i think", ""] {
            let turn = engine.take_turn(input, &memory).unwrap();
            assert_eq!(turn.category, Category::Unclear, "{}", input);
            assert_eq!(turn.memory, memory);
            assert_eq!(turn.next_state, State::SensoryFork);
        }
    }

    #[test]
    fn test_crisis_preempts_and_resumes() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "1"]);
        assert_eq!(
            memory.current_state(),
            State::SensationRefinement(Domain::Pressure)
        );
        let crisis = engine.take_turn("I want to kill myself", &memory).unwrap();
        assert_eq!(crisis.next_state, State::CrisisResponse);
        assert_eq!(crisis.signal, Some(HostSignal::Crisis));
        assert_eq!(crisis.memory.resume_state(), Some(memory.current_state()));

        // Unclear input at the crisis response is never dropped silently.
        let unclear = engine.take_turn("what", &crisis.memory).unwrap();
        assert_eq!(unclear.next_state, State::CrisisResponse);
        assert_eq!(unclear.memory, crisis.memory);

        let resumed = engine.take_turn("1", &crisis.memory).unwrap();
        assert_eq!(resumed.next_state, State::SensationRefinement(Domain::Pressure));
        assert!(resumed.display_text.contains("1) Tight"));
        assert_eq!(resumed.memory.resume_state(), None);
        assert_eq!(resumed.memory.sensation_tree_path(), memory.sensation_tree_path());

        let ended = engine.take_turn("2", &crisis.memory).unwrap();
        assert_eq!(ended.next_state, State::SessionEnd);
    }

    #[test]
    fn test_crisis_at_entry_resumes_into_orientation() {
        let engine = engine();
        let crisis = engine.take_turn("self harm", &SessionMemory::new()).unwrap();
        assert_eq!(crisis.memory.resume_state(), Some(State::Orientation));
        let resumed = engine.take_turn("resume", &crisis.memory).unwrap();
        assert_eq!(resumed.next_state, State::Orientation);
        assert!(resumed.display_text.contains("(1/13)"));
    }

    #[test]
    fn test_quit_hands_off_once() {
        let engine = engine();
        let memory = in_mirror_mode(&engine);
        let turn = engine.take_turn("quit", &memory).unwrap();
        assert_eq!(turn.next_state, State::SessionEnd);
        assert_eq!(turn.signal, Some(HostSignal::OffAppHandoff));
        assert!(turn.display_text.starts_with("Off-app:"));
        assert!(turn.memory.offapp_given());

        let early = engine
            .take_turn("exit", &engine.open(&SessionMemory::new()).unwrap().memory)
            .unwrap();
        assert_eq!(early.signal, None);
        assert_eq!(early.display_text, "Okay. See you next time.");
    }

    #[test]
    fn test_crisis_end_skips_offapp_handoff() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest", "kill myself"]);
        assert_eq!(memory.current_state(), State::CrisisResponse);

        let ended = engine.take_turn("2", &memory).unwrap();
        assert_eq!(ended.next_state, State::SessionEnd);
        assert_eq!(ended.signal, None);
        assert_eq!(ended.display_text, "Okay. See you next time.");
        assert!(!ended.memory.offapp_given());

        let quit = engine.take_turn("quit", &memory).unwrap();
        assert_eq!(quit.signal, None);
        assert!(!quit.memory.offapp_given());
    }

    #[test]
    fn test_resumed_crisis_response_keeps_signal() {
        let engine = engine();
        let memory = run(
            &engine,
            SessionMemory::returning(),
            &["", "1", "tight chest", "I want to kill myself"],
        );
        let map = memory.to_record().to_map();
        let record = crate::memory::SessionRecord::from_map(&map).unwrap();
        let stored = SessionMemory::from_record(&record).unwrap();

        let turn = engine.open(&stored).unwrap();
        assert_eq!(turn.next_state, State::CrisisResponse);
        assert_eq!(turn.signal, Some(HostSignal::Crisis));

        // Re-presenting after unclear input keeps the signal too.
        let unclear = engine.take_turn("hmm", &stored).unwrap();
        assert_eq!(unclear.signal, Some(HostSignal::Crisis));
    }

    #[test]
    fn test_missing_screen_text_fails_the_turn() {
        let engine = engine();
        let mut memory = SessionMemory::new();
        memory
            .apply_all(
                &[MemoryDelta::SetState(State::DenseLayer)],
                crate::memory::MAX_DENSE_LAYERS,
            )
            .unwrap();
        assert!(matches!(
            engine.open(&memory),
            Err(EngineError::InvalidMemory {
                field: "layer_index",
                ..
            })
        ));
    }

    #[test]
    fn test_story_redirect_clears_filled_path() {
        let engine = engine();
        let memory = run(
            &engine,
            in_mirror_mode(&engine),
            &["tight chest", "1", "1", "1", "3"],
        );
        assert_eq!(memory.current_state(), State::MirrorCentralView);
        assert_eq!(memory.sensation_tree_path(), ["pressure", "Tight"]);

        let turn = engine.take_turn("my boss yelled at me", &memory).unwrap();
        assert!(matches!(turn.category, Category::Story(_)));
        assert_eq!(turn.next_state, State::MirrorCentralView);
        assert!(turn.memory.sensation_tree_path().is_empty());
        assert_eq!(turn.memory.layer_index(), 0);
    }

    #[test]
    fn test_constructor_validates_config() {
        let config = EngineConfig {
            dense_layer_count: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(config),
            Err(ConfigError::Validation(_))
        ));
        assert!(Engine::new(EngineConfig::default().without_holds()).is_ok());
    }

    #[test]
    fn test_session_end_is_terminal() {
        let engine = engine();
        let ended = run(&engine, SessionMemory::new(), &["quit"]);
        for input in ["yes", "quit", "kill myself", ""] {
            let err = engine.take_turn(input, &ended).unwrap_err();
            assert!(matches!(
                err,
                EngineError::InvalidStateTransition {
                    from: State::SessionEnd,
                    ..
                }
            ));
        }
        assert!(engine.open(&ended).is_err());
    }

    #[test]
    fn test_sessions_are_isolated_and_deterministic() {
        let engine = engine();
        let script = ["tight chest", "1", "1", "2", "2", "", "my boss yelled at me"];
        let a = run(&engine, in_mirror_mode(&engine), &script);
        let b = run(&engine, in_mirror_mode(&engine), &script);
        assert_eq!(a, b);
        let untouched = in_mirror_mode(&engine);
        assert_eq!(untouched.successful_stays_count(), 0);
    }

    #[test]
    fn test_open_resumes_stored_state() {
        let engine = engine();
        let memory = run(&engine, in_mirror_mode(&engine), &["tight chest"]);
        let turn = engine.open(&memory).unwrap();
        assert_eq!(turn.next_state, State::SensationDomain);
        assert_eq!(turn.memory, memory);
        assert!(turn.display_text.contains("1) Pressure / Force"));
    }
}
