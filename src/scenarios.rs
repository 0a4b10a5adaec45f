//! Scripted sessions replayed through the engine.
//!
//! Each scenario is a fixed list of user inputs; an empty input stands for a
//! silence hold that ran out. Scenarios double as end-to-end tests and as the
//! `--scenario` demo mode of the binary.

use crate::engine::{Engine, Turn};
use crate::error::EngineError;
use crate::memory::SessionMemory;
use crate::state::State;

/// A named scripted session.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    /// Start as a returning user (skips orientation).
    pub returning_user: bool,
    pub inputs: &'static [&'static str],
    /// State the session must be in after the last input.
    pub expected_final: State,
}

/// One replayed turn.
#[derive(Debug, Clone)]
pub struct ScenarioStep {
    /// `None` for the opening turn.
    pub input: Option<&'static str>,
    pub turn: Turn,
}

/// Result of a replay.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub scenario: Scenario,
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioRun {
    pub fn final_memory(&self) -> Option<&SessionMemory> {
        self.steps.last().map(|step| &step.turn.memory)
    }

    pub fn final_state(&self) -> Option<State> {
        self.final_memory().map(SessionMemory::current_state)
    }

    pub fn passed(&self) -> bool {
        self.final_state() == Some(self.scenario.expected_final)
    }
}

const HAPPY_PATH: &[&str] = &[
    "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES",
    "1",
    "gut clench",
    "9",
    "7",
    "1",
    "",
    "2",
    "",
    "done",
];

const CRISIS: &[&str] = &["1", "tight chest", "I want to hurt myself", "what", "2"];

const FLOATING_PATTERN: &[&str] = &[
    "1",
    "I'm just watching it from awareness",
    "I'm aware of a spacious openness",
    "heavy belly",
];

const STORY_REDIRECT: &[&str] = &[
    "1",
    "my boss is getting on my nerves and I am so angry",
    "it happened yesterday at work",
    "am I doing this right?",
    "tight throat",
];

const DENSE_LADDER: &[&str] = &[
    "1", "tight chest", "1", "1", "1", "1", "", "1", "", "1", "", "1", "", "more dense", "2",
];

const SPACIOUSNESS_CHECK: &[&str] = &[
    "1",
    // three completed spacious stays
    "tight chest", "1", "1", "1", "2", "",
    "warm belly", "4", "1", "2", "2", "",
    "buzzing hands", "6", "1", "1", "less dense", "",
    // the fourth triggers the check
    "tight jaw", "1", "1", "1", "2",
    "1",
    "sensation is just happening",
    "",
];

/// Inputs for the returning-user scenario: review orientation, then enter
/// Mirror Mode.
const RETURNING_USER: &[&str] = &[
    "2", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES", "YES",
    "YES", "1",
];

/// Every built-in scenario.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "happy_path",
        description: "orientation, one spacious stay, done",
        returning_user: false,
        inputs: HAPPY_PATH,
        expected_final: State::SessionEnd,
    },
    Scenario {
        name: "crisis",
        description: "crisis language mid-tree, then end",
        returning_user: true,
        inputs: CRISIS,
        expected_final: State::SessionEnd,
    },
    Scenario {
        name: "floating_pattern",
        description: "floating is named and redirected before sensation lands",
        returning_user: true,
        inputs: FLOATING_PATTERN,
        expected_final: State::SensationDomain,
    },
    Scenario {
        name: "story_redirect",
        description: "venting with emotion words stays in Mirror Mode",
        returning_user: true,
        inputs: STORY_REDIRECT,
        expected_final: State::SensationDomain,
    },
    Scenario {
        name: "dense_ladder",
        description: "four dense layers, then stop",
        returning_user: true,
        inputs: DENSE_LADDER,
        expected_final: State::SessionEnd,
    },
    Scenario {
        name: "spaciousness_check",
        description: "the check fires on the fourth spacious stay",
        returning_user: true,
        inputs: SPACIOUSNESS_CHECK,
        expected_final: State::MirrorCentralView,
    },
    Scenario {
        name: "returning_user",
        description: "returning user reviews orientation",
        returning_user: true,
        inputs: RETURNING_USER,
        expected_final: State::MirrorCentralView,
    },
];

/// Look up a scenario by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Replay a scenario from a fresh session.
pub fn run(engine: &Engine, scenario: &Scenario) -> Result<ScenarioRun, EngineError> {
    let memory = if scenario.returning_user {
        SessionMemory::returning()
    } else {
        SessionMemory::new()
    };

    let opening = engine.open(&memory)?;
    let mut memory = opening.memory.clone();
    let mut steps = vec![ScenarioStep {
        input: None,
        turn: opening,
    }];

    for &input in scenario.inputs {
        let turn = engine.take_turn(input, &memory)?;
        memory = turn.memory.clone();
        steps.push(ScenarioStep {
            input: Some(input),
            turn,
        });
    }

    log::debug!(
        "scenario {} finished in {}",
        scenario.name,
        memory.current_state()
    );
    Ok(ScenarioRun {
        scenario: *scenario,
        steps,
    })
}
