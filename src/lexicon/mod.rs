//! Lexicon and pattern tables for the escape-pattern classifier.
//!
//! Everything in here is static data: keyword and phrase tables for crisis
//! vocabulary, session-termination tokens, acknowledgment tokens, narrative
//! markers, escape-pattern triggers, and present-tense sensation vocabulary.
//! Phrase tables are compiled once into word-bounded matchers; matching is
//! done against [`normalize`]d text only.
//!
//! Per-state numbered menus (the forced-choice token sets) live in
//! [`menus`].

pub mod menus;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::classifier::EscapePattern;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

static DISALLOWED_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9'/\- ]+").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize an utterance for lexical matching.
///
/// Lowercases, folds typographic apostrophes to `'`, replaces every other
/// punctuation mark with a space, collapses whitespace and trims. Apostrophes,
/// hyphens and slashes survive because lexicon entries use them
/// (`"i'm trying to"`, `"self-harm"`, `"push/pull"`).
pub fn normalize(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}', '`'], "'");
    let cleaned = DISALLOWED_CHARS.replace_all(&lowered, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&cleaned, " ");
    collapsed
        .trim()
        .trim_matches(|c| c == '\'' || c == '-' || c == '/')
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// PhraseSet
// ---------------------------------------------------------------------------

/// An ordered table of phrases compiled into word-bounded matchers.
///
/// Lookups report the first phrase in table order that occurs anywhere in
/// the (normalized) text, so table order doubles as tie-break order.
#[derive(Debug)]
pub struct PhraseSet {
    entries: Vec<(&'static str, Regex)>,
}

impl PhraseSet {
    /// Compile a phrase table. Each phrase must appear as whole words.
    pub fn new(phrases: &'static [&'static str]) -> Self {
        let entries = phrases
            .iter()
            .map(|phrase| {
                let pattern = format!(r"\b{}\b", regex::escape(phrase));
                // Escaped literals always form a valid pattern.
                (*phrase, Regex::new(&pattern).unwrap())
            })
            .collect();
        Self { entries }
    }

    /// First phrase (in table order) contained in `normalized`.
    pub fn first_match(&self, normalized: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(normalized))
            .map(|(phrase, _)| *phrase)
    }

    /// Whether any phrase of the table is contained in `normalized`.
    pub fn matches(&self, normalized: &str) -> bool {
        self.first_match(normalized).is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Self-harm and suicide vocabulary. Any occurrence is a crisis.
pub const CRISIS_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "want to die",
    "wanna die",
    "self-harm",
    "self harm",
    "selfharm",
    "hurt myself",
    "hurting myself",
    "cut myself",
    "cutting myself",
    "hurt someone else",
    "kill someone",
];

/// Session-termination tokens. Matched against the whole normalized
/// utterance, never as a substring.
pub const QUIT_TOKENS: &[&str] = &[
    "quit",
    "exit",
    "done",
    "stop",
    "finished",
    "i'm finished",
    "im finished",
    "i'm done",
    "im done",
    "that's enough",
    "thats enough",
    "end session",
];

/// Short acknowledgments, matched against the whole normalized utterance.
pub const AFFIRM_TOKENS: &[&str] = &[
    "yes",
    "y",
    "yep",
    "yup",
    "yeah",
    "ok",
    "okay",
    "k",
    "sure",
    "ready",
    "continue",
    "correct",
    "exactly",
    "that's right",
    "thats right",
    "true",
];

/// Third-party references and situational/temporal markers. These make an
/// utterance narrative even when emotion or body words are also present.
pub const NARRATIVE_MARKERS: &[&str] = &[
    // other people
    "my boss",
    "my wife",
    "my husband",
    "my partner",
    "my mom",
    "my dad",
    "my mother",
    "my father",
    "my friend",
    "my coworker",
    "my colleague",
    "my ex",
    "my sister",
    "my brother",
    "my family",
    "my kids",
    "my son",
    "my daughter",
    "he said",
    "she said",
    "they said",
    "he did",
    "she did",
    "they did",
    "he is",
    "she is",
    "they are",
    "he was",
    "she was",
    "they were",
    // situations and time
    "at work",
    "at home",
    "at school",
    "in the meeting",
    "on the phone",
    "getting on my nerves",
    "driving me crazy",
    "making me",
    "did to me",
    "said to me",
    "happened",
    "yesterday",
    "last week",
    "last night",
    "this morning",
    "earlier today",
    "tomorrow",
    "when i was",
    "after i",
    "before i",
    // venting
    "i can't believe",
    "i cant believe",
    "can you believe",
    "it's so unfair",
    "its so unfair",
    "i'm so sick of",
    "im so sick of",
    "i'm tired of",
    "im tired of",
];

/// Meaning-making and explanation markers.
pub const MEANING_MARKERS: &[&str] = &[
    "meaning",
    "means",
    "because",
    "so that",
    "in the way",
    "wholeness",
    "should",
    "supposed to",
    "i think",
    "i feel it is",
    "this is not",
    "doesn't work",
    "doesnt work",
    "not working",
    "why is",
    "why does",
];

const CLAIMING_INSIGHT_TRIGGERS: &[&str] = &[
    "i just realized",
    "oh wow",
    "i get it",
    "this is the answer",
    "now i understand",
    "breakthrough",
    "i'm seeing a pattern",
    "i see what i do",
];

const CERTAINTY_SEEKING_TRIGGERS: &[&str] = &[
    "am i doing",
    "doing this right",
    "how do i know",
    "what if",
    "is this correct",
    "is it working",
    "tell me if",
    "how can i be sure",
    "reassure me",
    "tell me i'm going to be okay",
];

const PROBLEM_SOLVING_TRIGGERS: &[&str] = &[
    "should i",
    "what should i do",
    "what's the answer",
    "how do i fix",
    "tell me what to do",
    "give me advice",
];

const MANAGING_TRIGGERS: &[&str] = &[
    "i'm trying to",
    "im trying to",
    "i keep trying",
    "i need to keep",
    "i have to stay",
    "i'm managing",
    "i'm forcing",
    "i'm controlling",
    "checking if i'm doing it right",
];

const DESTINATION_SEEKING_TRIGGERS: &[&str] = &[
    "what happens now",
    "is that it",
    "this isn't leading",
    "not leading anywhere",
    "nothing's happening",
    "nothing is happening",
    "i'm bored",
    "im bored",
    "when will this",
    "until it",
    "waiting for",
    "so it will",
    "so this resolves",
    "so it opens",
    "to get through",
    "to make it go away",
    "shift",
    "resolve",
];

const FLOATING_TRIGGERS: &[&str] = &[
    "i'm aware of",
    "i'm observing",
    "from awareness",
    "spacious",
    "just watching",
    "watching it",
    "the witness",
    "above it",
    "dissociated",
];

const UNKNOWN_AVOIDANCE_TRIGGERS: &[&str] = &[
    "i can't stand not knowing",
    "cant stand not knowing",
    "uncertainty is",
    "not knowing is",
    "the unknown",
    "i need certainty",
    "i can't handle uncertainty",
];

/// Body locations.
pub const LOCATION_WORDS: &[&str] = &[
    "chest",
    "gut",
    "stomach",
    "throat",
    "neck",
    "jaw",
    "shoulders",
    "shoulder",
    "back",
    "heart",
    "belly",
    "solar plexus",
    "head",
    "face",
    "hands",
];

/// Emotion words. They count as present-moment signal on their own but
/// never outrank a narrative marker.
pub const EMOTION_WORDS: &[&str] = &[
    "fear",
    "afraid",
    "scared",
    "anxiety",
    "anxious",
    "sadness",
    "sad",
    "anger",
    "angry",
    "shame",
    "panic",
    "stress",
    "stressed",
    "frustrated",
    "grief",
];

/// Contraction vocabulary.
pub const CONTRACTION_WORDS: &[&str] = &[
    "tight",
    "tightness",
    "bracing",
    "brace",
    "clench",
    "clenching",
    "contract",
    "contraction",
    "narrow",
    "narrowing",
    "pulling in",
    "closing",
    "compressed",
    "pressure",
];

/// Sensation qualities.
pub const SENSATION_WORDS: &[&str] = &[
    "pressure",
    "heat",
    "warm",
    "cold",
    "vibration",
    "vibrating",
    "buzz",
    "buzzing",
    "tingle",
    "tingling",
    "flutter",
    "ache",
    "aching",
    "heavy",
    "light",
    "movement",
    "moving",
    "throb",
    "throbbing",
    "push",
    "pull",
    "push/pull",
    "holding",
    "tension",
    "numb",
    "hollow",
    "pulsing",
];

/// Resistance to the sensation itself ("make it stop").
pub const RESISTANCE_MARKERS: &[&str] = &[
    "i don't want",
    "i dont want",
    "i can't",
    "i cant",
    "i shouldn't",
    "i shouldnt",
    "i hate",
    "this shouldn't",
    "this shouldnt",
    "i need this to stop",
    "make it stop",
    "get rid of",
    "go away",
    "can't stand",
    "cant stand",
];

// ---------------------------------------------------------------------------
// Compiled lexicon
// ---------------------------------------------------------------------------

/// All phrase tables, compiled.
#[derive(Debug)]
pub struct Lexicon {
    pub crisis: PhraseSet,
    pub narrative: PhraseSet,
    pub meaning: PhraseSet,
    pub escape_triggers: Vec<(EscapePattern, PhraseSet)>,
    pub location: PhraseSet,
    pub emotion: PhraseSet,
    pub contraction: PhraseSet,
    pub sensation: PhraseSet,
    pub resistance: PhraseSet,
}

impl Lexicon {
    fn compile() -> Self {
        Self {
            crisis: PhraseSet::new(CRISIS_PHRASES),
            narrative: PhraseSet::new(NARRATIVE_MARKERS),
            meaning: PhraseSet::new(MEANING_MARKERS),
            escape_triggers: vec![
                (EscapePattern::ClaimingInsight, PhraseSet::new(CLAIMING_INSIGHT_TRIGGERS)),
                (EscapePattern::CertaintySeeking, PhraseSet::new(CERTAINTY_SEEKING_TRIGGERS)),
                (EscapePattern::ProblemSolving, PhraseSet::new(PROBLEM_SOLVING_TRIGGERS)),
                (EscapePattern::Managing, PhraseSet::new(MANAGING_TRIGGERS)),
                (EscapePattern::DestinationSeeking, PhraseSet::new(DESTINATION_SEEKING_TRIGGERS)),
                (EscapePattern::Floating, PhraseSet::new(FLOATING_TRIGGERS)),
                (EscapePattern::UnknownAvoidance, PhraseSet::new(UNKNOWN_AVOIDANCE_TRIGGERS)),
            ],
            location: PhraseSet::new(LOCATION_WORDS),
            emotion: PhraseSet::new(EMOTION_WORDS),
            contraction: PhraseSet::new(CONTRACTION_WORDS),
            sensation: PhraseSet::new(SENSATION_WORDS),
            resistance: PhraseSet::new(RESISTANCE_MARKERS),
        }
    }

    /// First escape-pattern trigger in fixed pattern order.
    pub fn escape_trigger(&self, normalized: &str) -> Option<(EscapePattern, &'static str)> {
        self.escape_triggers.iter().find_map(|(pattern, set)| {
            set.first_match(normalized).map(|phrase| (*pattern, phrase))
        })
    }
}

static LEXICON: Lazy<Lexicon> = Lazy::new(Lexicon::compile);

/// The process-wide compiled lexicon.
pub fn lexicon() -> &'static Lexicon {
    &LEXICON
}

/// Whole-utterance membership test against a token table.
pub fn is_token(normalized: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| *t == normalized)
}
