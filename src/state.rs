//! Named points in the conversation graph.
//!
//! Exactly one [`State`] is active per session. States are grouped into
//! [`Phase`]s for logging and for the driver's display; the phase has no
//! effect on transitions.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::sensation_tree::Domain;

/// Conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Entry,
    Orientation,
    Routing,
    MirrorCentralView,
    SensationDomain,
    SensationRefinement(Domain),
    ClenchChoice,
    SensoryFork,
    DenseLayer,
    DenseContinueOrStop,
    SpaciousSilence,
    SpaciousWhatsHere,
    SpaciousnessCheck1,
    SpaciousnessCheck2,
    SpaciousnessSilence,
    CrisisResponse,
    SessionEnd,
}

/// Sub-graph a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entry,
    Orientation,
    Routing,
    MirrorMode,
    SensationTree,
    ClenchPath,
    SensoryFork,
    DenseLayers,
    SpaciousPath,
    SpaciousnessCheck,
    Crisis,
    SessionEnd,
}

impl State {
    /// SCREAMING_SNAKE name, without the refinement's domain.
    pub fn name(self) -> &'static str {
        match self {
            State::Entry => "ENTRY",
            State::Orientation => "ORIENTATION",
            State::Routing => "ROUTING",
            State::MirrorCentralView => "MIRROR_CENTRAL_VIEW",
            State::SensationDomain => "SENSATION_DOMAIN",
            State::SensationRefinement(_) => "SENSATION_REFINEMENT",
            State::ClenchChoice => "CLENCH_CHOICE",
            State::SensoryFork => "SENSORY_FORK",
            State::DenseLayer => "DENSE_LAYER",
            State::DenseContinueOrStop => "DENSE_CONTINUE_OR_STOP",
            State::SpaciousSilence => "SPACIOUS_SILENCE",
            State::SpaciousWhatsHere => "SPACIOUS_WHATS_HERE",
            State::SpaciousnessCheck1 => "SPACIOUSNESS_CHECK_1",
            State::SpaciousnessCheck2 => "SPACIOUSNESS_CHECK_2",
            State::SpaciousnessSilence => "SPACIOUSNESS_SILENCE",
            State::CrisisResponse => "CRISIS_RESPONSE",
            State::SessionEnd => "SESSION_END",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            State::Entry => Phase::Entry,
            State::Orientation => Phase::Orientation,
            State::Routing => Phase::Routing,
            State::MirrorCentralView | State::SpaciousWhatsHere => Phase::MirrorMode,
            State::SensationDomain | State::SensationRefinement(_) => Phase::SensationTree,
            State::ClenchChoice => Phase::ClenchPath,
            State::SensoryFork => Phase::SensoryFork,
            State::DenseLayer | State::DenseContinueOrStop => Phase::DenseLayers,
            State::SpaciousSilence => Phase::SpaciousPath,
            State::SpaciousnessCheck1 | State::SpaciousnessCheck2 | State::SpaciousnessSilence => {
                Phase::SpaciousnessCheck
            }
            State::CrisisResponse => Phase::Crisis,
            State::SessionEnd => Phase::SessionEnd,
        }
    }

    /// Whether the state accepts any reply, including an empty one, and
    /// moves on.
    pub fn accepts_any_input(self) -> bool {
        matches!(
            self,
            State::DenseLayer
                | State::SpaciousSilence
                | State::SpaciousnessCheck2
                | State::SpaciousnessSilence
        )
    }

    pub fn is_terminal(self) -> bool {
        self == State::SessionEnd
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::SensationRefinement(domain) => write!(f, "{}:{}", self.name(), domain.key()),
            _ => f.write_str(self.name()),
        }
    }
}

/// A state name that does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown state name: {0}")]
pub struct UnknownState(pub String);

impl FromStr for State {
    type Err = UnknownState;

    /// Inverse of `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownState(s.to_string());
        if let Some(key) = s.strip_prefix("SENSATION_REFINEMENT:") {
            return Domain::from_key(key)
                .map(State::SensationRefinement)
                .ok_or_else(unknown);
        }
        let state = match s {
            "ENTRY" => State::Entry,
            "ORIENTATION" => State::Orientation,
            "ROUTING" => State::Routing,
            "MIRROR_CENTRAL_VIEW" => State::MirrorCentralView,
            "SENSATION_DOMAIN" => State::SensationDomain,
            "CLENCH_CHOICE" => State::ClenchChoice,
            "SENSORY_FORK" => State::SensoryFork,
            "DENSE_LAYER" => State::DenseLayer,
            "DENSE_CONTINUE_OR_STOP" => State::DenseContinueOrStop,
            "SPACIOUS_SILENCE" => State::SpaciousSilence,
            "SPACIOUS_WHATS_HERE" => State::SpaciousWhatsHere,
            "SPACIOUSNESS_CHECK_1" => State::SpaciousnessCheck1,
            "SPACIOUSNESS_CHECK_2" => State::SpaciousnessCheck2,
            "SPACIOUSNESS_SILENCE" => State::SpaciousnessSilence,
            "CRISIS_RESPONSE" => State::CrisisResponse,
            "SESSION_END" => State::SessionEnd,
            _ => return Err(unknown()),
        };
        Ok(state)
    }
}
