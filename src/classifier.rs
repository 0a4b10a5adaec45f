//! Escape-pattern classifier.
//!
//! Assigns every utterance exactly one [`Category`] given the active
//! [`State`]. The precedence below is the contract; the first rule that
//! matches wins:
//!
//! 1. crisis vocabulary anywhere in the utterance, in any state
//! 2. a whole-utterance session-termination token
//! 3. in a numbered-menu state: a menu token, otherwise `Unclear`
//! 4. an escape-pattern trigger, a narrative marker or a meaning marker,
//!    even when emotion or body words are also present
//! 5. present-tense body or attention vocabulary
//! 6. a whole-utterance acknowledgment
//! 7. `Unclear`
//!
//! Classification is purely lexical and has no side effects beyond a
//! `debug` log line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lexicon::menus::menu_for;
use crate::lexicon::{is_token, lexicon, normalize, AFFIRM_TOKENS, QUIT_TOKENS};
use crate::state::State;

// ---------------------------------------------------------------------------
// EscapePattern
// ---------------------------------------------------------------------------

/// The ways attention moves away from what is actually here.
///
/// `Story` is the plain narrative case; the other seven are named by the
/// trigger phrase that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapePattern {
    Story,
    CertaintySeeking,
    ProblemSolving,
    ClaimingInsight,
    Managing,
    DestinationSeeking,
    Floating,
    UnknownAvoidance,
}

impl EscapePattern {
    pub const ALL: [EscapePattern; 8] = [
        EscapePattern::Story,
        EscapePattern::CertaintySeeking,
        EscapePattern::ProblemSolving,
        EscapePattern::ClaimingInsight,
        EscapePattern::Managing,
        EscapePattern::DestinationSeeking,
        EscapePattern::Floating,
        EscapePattern::UnknownAvoidance,
    ];

    /// Stable key, used in the screen-text tables and persisted records.
    pub fn key(self) -> &'static str {
        match self {
            EscapePattern::Story => "story",
            EscapePattern::CertaintySeeking => "certainty_seeking",
            EscapePattern::ProblemSolving => "problem_solving",
            EscapePattern::ClaimingInsight => "claiming_insight",
            EscapePattern::Managing => "managing",
            EscapePattern::DestinationSeeking => "destination_seeking",
            EscapePattern::Floating => "floating",
            EscapePattern::UnknownAvoidance => "unknown_avoidance",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for EscapePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Closed set of classifier outputs. Exactly one per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Crisis,
    Story(EscapePattern),
    /// 1-based position in the active menu.
    ForcedChoice(u8),
    SensationReport,
    Affirm,
    Unclear,
    Quit,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Crisis => f.write_str("CRISIS"),
            Category::Story(pattern) => write!(f, "STORY({})", pattern),
            Category::ForcedChoice(n) => write!(f, "FORCED_CHOICE({})", n),
            Category::SensationReport => f.write_str("SENSATION_REPORT"),
            Category::Affirm => f.write_str("AFFIRM"),
            Category::Unclear => f.write_str("UNCLEAR"),
            Category::Quit => f.write_str("QUIT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Which lexicon tables an utterance hit.
///
/// Tables after the deciding rule are still evaluated for free-text
/// utterances so that a `Story` classification can show the body or emotion
/// words it outranked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// The phrase or token that decided the category, if any.
    pub matched: Option<&'static str>,
    pub location: bool,
    pub emotion: Option<&'static str>,
    pub contraction: bool,
    pub sensation: bool,
    pub resistance: bool,
}

impl Evidence {
    /// Whether any present-moment body or attention vocabulary was found.
    pub fn has_sensation_signal(&self) -> bool {
        self.location || self.emotion.is_some() || self.contraction || self.sensation || self.resistance
    }
}

/// A category plus the lexical evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub normalized: String,
    pub evidence: Evidence,
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Classify an utterance in the context of the active state.
pub fn classify(utterance: &str, active_state: State) -> Category {
    classify_detailed(utterance, active_state).category
}

/// Classify and report the evidence behind the decision.
pub fn classify_detailed(utterance: &str, active_state: State) -> Classification {
    let normalized = normalize(utterance);
    let (category, evidence) = decide(&normalized, active_state);
    log::debug!(
        "classify state={} text={:?} -> {} (matched={:?})",
        active_state,
        normalized,
        category,
        evidence.matched
    );
    Classification {
        category,
        normalized,
        evidence,
    }
}

fn decide(normalized: &str, active_state: State) -> (Category, Evidence) {
    let lex = lexicon();

    if let Some(phrase) = lex.crisis.first_match(normalized) {
        let evidence = Evidence {
            matched: Some(phrase),
            ..Evidence::default()
        };
        return (Category::Crisis, evidence);
    }

    if is_token(normalized, QUIT_TOKENS) {
        return (Category::Quit, Evidence::default());
    }

    if let Some(menu) = menu_for(active_state) {
        return match menu.choose(normalized) {
            Some(n) => (Category::ForcedChoice(n), Evidence::default()),
            None => (Category::Unclear, Evidence::default()),
        };
    }

    let mut evidence = Evidence {
        matched: None,
        location: lex.location.matches(normalized),
        emotion: lex.emotion.first_match(normalized),
        contraction: lex.contraction.matches(normalized),
        sensation: lex.sensation.matches(normalized),
        resistance: lex.resistance.matches(normalized),
    };

    if let Some((pattern, phrase)) = lex.escape_trigger(normalized) {
        evidence.matched = Some(phrase);
        return (Category::Story(pattern), evidence);
    }

    // Narrative markers outrank emotion and body words.
    if let Some(phrase) = lex.narrative.first_match(normalized) {
        evidence.matched = Some(phrase);
        return (Category::Story(EscapePattern::Story), evidence);
    }

    if let Some(phrase) = lex.meaning.first_match(normalized) {
        evidence.matched = Some(phrase);
        return (Category::Story(EscapePattern::Story), evidence);
    }

    if evidence.has_sensation_signal() {
        return (Category::SensationReport, evidence);
    }

    if let Some(token) = AFFIRM_TOKENS.iter().find(|t| **t == normalized) {
        evidence.matched = Some(token);
        return (Category::Affirm, evidence);
    }

    (Category::Unclear, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensation_tree::Domain;

    const FREE_TEXT: State = State::MirrorCentralView;

    #[test]
    fn test_narrative_beats_emotion() {
        let c = classify_detailed("My boss is getting on my nerves and I am so angry", FREE_TEXT);
        assert_eq!(c.category, Category::Story(EscapePattern::Story));
        assert_eq!(c.evidence.matched, Some("my boss"));
        assert_eq!(c.evidence.emotion, Some("angry"));
    }

    #[test]
    fn test_narrative_beats_body_words() {
        for text in [
            "my chest got tight at work yesterday",
            "I was anxious in the meeting",
            "she said something and now my throat is tight",
        ] {
            assert!(
                matches!(classify(text, FREE_TEXT), Category::Story(_)),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_sensation_report() {
        for text in [
            "tightness in my chest",
            "there's a buzzing in my hands",
            "Heavy. Stomach.",
            "fear",
        ] {
            assert_eq!(classify(text, FREE_TEXT), Category::SensationReport, "{}", text);
        }
    }

    #[test]
    fn test_crisis_wins_everywhere() {
        let states = [
            State::Entry,
            State::Orientation,
            State::Routing,
            FREE_TEXT,
            State::SensationDomain,
            State::SensationRefinement(Domain::Pressure),
            State::ClenchChoice,
            State::SensoryFork,
            State::DenseContinueOrStop,
            State::SpaciousnessCheck1,
            State::SpaciousnessSilence,
            State::CrisisResponse,
        ];
        for state in states {
            assert_eq!(
                classify("my boss said I should just kill myself", state),
                Category::Crisis,
                "{}",
                state
            );
            assert_eq!(classify("SELF-HARM", state), Category::Crisis, "{}", state);
        }
    }

    #[test]
    fn test_quit_is_whole_token_only() {
        assert_eq!(classify("Done.", FREE_TEXT), Category::Quit);
        assert_eq!(classify("I'm done", State::SensoryFork), Category::Quit);
        assert_ne!(classify("I'm done with my boss", FREE_TEXT), Category::Quit);
    }

    #[test]
    fn test_forced_choice_rejects_everything_else() {
        assert_eq!(classify("2", State::SensoryFork), Category::ForcedChoice(2));
        assert_eq!(classify("Less dense", State::SensoryFork), Category::ForcedChoice(2));
        assert_eq!(classify("4", State::SensoryFork), Category::Unclear);
        assert_eq!(classify("tight chest", State::ClenchChoice), Category::Unclear);
        assert_eq!(classify("my boss yelled", State::ClenchChoice), Category::Unclear);
        assert_eq!(classify("", State::SensoryFork), Category::Unclear);
    }

    #[test]
    fn test_escape_patterns() {
        let cases = [
            ("am I doing this right?", EscapePattern::CertaintySeeking),
            ("what should I do about it", EscapePattern::ProblemSolving),
            ("oh wow, I get it now", EscapePattern::ClaimingInsight),
            ("I'm trying to relax my jaw", EscapePattern::Managing),
            ("nothing is happening", EscapePattern::DestinationSeeking),
            ("I'm just watching it from awareness", EscapePattern::Floating),
            ("I can't handle uncertainty", EscapePattern::UnknownAvoidance),
            ("my chest is tight because I failed", EscapePattern::Story),
        ];
        for (text, pattern) in cases {
            assert_eq!(classify(text, FREE_TEXT), Category::Story(pattern), "{}", text);
        }
    }

    #[test]
    fn test_affirm_and_unclear() {
        assert_eq!(classify("YES", State::Orientation), Category::Affirm);
        assert_eq!(classify("ok", FREE_TEXT), Category::Affirm);
        assert_eq!(classify("hmm", FREE_TEXT), Category::Unclear);
        assert_eq!(classify("   ", FREE_TEXT), Category::Unclear);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let text = "I'm tired of feeling this pressure in my chest";
        let first = classify_detailed(text, FREE_TEXT);
        for _ in 0..5 {
            assert_eq!(classify_detailed(text, FREE_TEXT), first);
        }
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::ForcedChoice(3).to_string(), "FORCED_CHOICE(3)");
        assert_eq!(
            Category::Story(EscapePattern::Floating).to_string(),
            "STORY(floating)"
        );
    }

    #[test]
    fn test_pattern_key_round_trip() {
        for pattern in EscapePattern::ALL {
            assert_eq!(EscapePattern::from_key(pattern.key()), Some(pattern));
        }
        assert_eq!(EscapePattern::from_key("nope"), None);
    }
}
