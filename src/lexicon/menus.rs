//! Accepted token sets for every numbered menu.
//!
//! Each forced-choice state declares its own tokens here, exhaustively: the
//! numeral plus natural-language synonyms for each position. Nothing is
//! inferred from free text; an utterance either normalizes to one of the
//! listed tokens or it is not an answer.

use crate::lexicon::normalize;
use crate::sensation_tree::Domain;
use crate::state::State;

const ROUTING: &[&[&str]] = &[
    &["1", "mirror", "mirror mode", "go to mirror mode"],
    &["2", "review", "orientation", "review orientation"],
];

const CLENCH: &[&[&str]] = &[
    &["1", "yes", "y"],
    &["2", "i think so", "think so", "maybe yes", "sort of"],
    &[
        "3",
        "not sure",
        "not sure / unclear",
        "no",
        "n",
        "unclear",
        "unsure",
        "maybe",
        "i don't know",
        "i dont know",
        "idk",
    ],
];

const SENSORY_FORK: &[&[&str]] = &[
    &[
        "1",
        "more dense",
        "more dense / tighter",
        "denser",
        "dense",
        "tighter",
        "heavier",
        "worse",
    ],
    &[
        "2",
        "less dense",
        "less dense / more spacious",
        "more spacious",
        "spacious",
        "lighter",
        "open",
        "better",
        "released",
    ],
    &["3", "no change", "no real change", "same", "unchanged", "nothing"],
];

const CONTINUE_OR_STOP: &[&[&str]] = &[
    &["1", "continue", "keep going", "yes"],
    &["2", "stop", "stop here", "no", "enough"],
];

const SPACIOUSNESS_CHECK: &[&[&str]] = &[
    &["1", "yes", "both", "both are here", "yes both are here"],
    &["2", "only contraction", "contraction", "no"],
    &[
        "3",
        "not sure",
        "unsure",
        "unclear",
        "maybe",
        "i don't know",
        "i dont know",
        "idk",
    ],
];

const CRISIS_RESPONSE: &[&[&str]] = &[
    &["1", "resume", "resume where we were"],
    &["2", "end", "end the session"],
];

/// A numbered menu: one token list per position, position 1 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    options: Vec<Vec<String>>,
}

impl Menu {
    fn from_static(table: &[&[&str]]) -> Self {
        Self {
            options: table
                .iter()
                .map(|tokens| tokens.iter().map(|t| (*t).to_string()).collect())
                .collect(),
        }
    }

    /// A menu whose positions are the given labels: each accepts its numeral,
    /// its normalized label, and an optional alias.
    fn numbered<'a>(labels: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Self {
        let options = labels
            .into_iter()
            .enumerate()
            .map(|(i, (label, alias))| {
                let mut tokens = vec![(i + 1).to_string(), normalize(label)];
                if let Some(alias) = alias {
                    tokens.push(normalize(alias));
                }
                tokens.dedup();
                tokens
            })
            .collect();
        Self { options }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.options.len()
    }

    /// 1-based position whose token list contains `normalized`.
    pub fn choose(&self, normalized: &str) -> Option<u8> {
        self.options
            .iter()
            .position(|tokens| tokens.iter().any(|t| t == normalized))
            .and_then(|idx| u8::try_from(idx + 1).ok())
    }

    /// Accepted tokens for a 1-based position.
    #[cfg(test)]
    pub(crate) fn tokens(&self, position: u8) -> Option<&[String]> {
        let idx = usize::from(position).checked_sub(1)?;
        self.options.get(idx).map(Vec::as_slice)
    }
}

/// The menu the given state expects, or `None` for free-text states.
pub fn menu_for(state: State) -> Option<Menu> {
    match state {
        State::Routing => Some(Menu::from_static(ROUTING)),
        State::SensationDomain => Some(Menu::numbered(
            Domain::ALL.iter().map(|d| (d.label(), Some(d.key()))),
        )),
        State::SensationRefinement(domain) => Some(Menu::numbered(
            domain.refinements().iter().map(|r| (*r, None)),
        )),
        State::ClenchChoice => Some(Menu::from_static(CLENCH)),
        State::SensoryFork => Some(Menu::from_static(SENSORY_FORK)),
        State::DenseContinueOrStop => Some(Menu::from_static(CONTINUE_OR_STOP)),
        State::SpaciousnessCheck1 => Some(Menu::from_static(SPACIOUSNESS_CHECK)),
        State::CrisisResponse => Some(Menu::from_static(CRISIS_RESPONSE)),
        _ => None,
    }
}
