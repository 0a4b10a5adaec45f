//! Screen text for orientation and Mirror Mode.
//!
//! All user-facing text is static data, embedded at compile time from
//! `en.json` and parsed once into a typed [`Script`]:
//!
//! - `orientation`: the orientation screens, in order
//! - `prompts`: every fixed Mirror Mode prompt
//! - `dense_layers`: one text per dense layer
//! - `patterns`: label and first-time clarifier per escape pattern
//! - `redirect_first` / `redirect_repeat`: story-redirect templates
//!
//! Templates use `{name}` placeholders filled by [`fill`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::classifier::EscapePattern;
use crate::error::ScriptError;
use crate::memory::{MAX_DENSE_LAYERS, ORIENTATION_SCREENS};
use crate::sensation_tree::{format_domain_options, format_refinement_options, Domain};

/// English screen text, embedded at compile time.
pub const EN_JSON: &str = include_str!("en.json");

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*)\}").unwrap());

static EMBEDDED: Lazy<Script> =
    Lazy::new(|| Script::from_json(EN_JSON).expect("embedded en.json must be a complete script"));

/// Replace `{name}` placeholders with the given values. Unknown
/// placeholders are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// One orientation screen.
#[derive(Debug, Clone, Deserialize)]
pub struct OrientationScreen {
    pub title: String,
    pub body: String,
    pub action: String,
}

/// Fixed Mirror Mode prompts.
#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
    pub routing_new: String,
    pub routing_returning: String,
    pub central_view: String,
    pub domain_header: String,
    pub domain_footer: String,
    pub refinement_header: String,
    pub refinement_footer: String,
    pub echo: String,
    pub clench_question: String,
    pub clench_instruction: String,
    pub raw_sensation: String,
    pub sensory_fork: String,
    pub no_change: String,
    pub continue_or_stop: String,
    pub spacious_stay: String,
    pub whats_here_now: String,
    pub spaciousness_check_1: String,
    pub spaciousness_check_2: String,
    pub spaciousness_fallback: String,
    pub crisis: String,
    pub completion: String,
    pub offapp_handoff: String,
}

/// Label and one-line clarifier for an escape pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternText {
    pub label: String,
    pub clarifier: String,
}

/// Every piece of text the engine renders.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub orientation: Vec<OrientationScreen>,
    pub prompts: Prompts,
    pub dense_layers: Vec<String>,
    patterns: HashMap<String, PatternText>,
    redirect_first: String,
    redirect_repeat: String,
}

impl Script {
    /// The embedded English script, parsed on first use.
    pub fn embedded() -> &'static Script {
        &EMBEDDED
    }

    /// Parse and validate a script from JSON.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        if self.orientation.len() != ORIENTATION_SCREENS {
            return Err(ScriptError::Incomplete(format!(
                "expected {} orientation screens, found {}",
                ORIENTATION_SCREENS,
                self.orientation.len()
            )));
        }
        if self.dense_layers.len() < usize::from(MAX_DENSE_LAYERS) {
            return Err(ScriptError::Incomplete(format!(
                "expected {} dense layers, found {}",
                MAX_DENSE_LAYERS,
                self.dense_layers.len()
            )));
        }
        if let Some(missing) = EscapePattern::ALL
            .iter()
            .find(|p| !self.patterns.contains_key(p.key()))
        {
            return Err(ScriptError::Incomplete(format!(
                "no text for pattern {}",
                missing
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    pub fn orientation_len(&self) -> usize {
        self.orientation.len()
    }

    /// Full text of a 0-based orientation screen.
    pub fn orientation_screen(&self, index: usize) -> Option<String> {
        self.orientation.get(index).map(|screen| {
            format!(
                "{} ({}/{})\n\n{}\n\n{}",
                screen.title,
                index + 1,
                self.orientation.len(),
                screen.body,
                screen.action
            )
        })
    }

    pub fn routing(&self, returning_user: bool) -> &str {
        if returning_user {
            &self.prompts.routing_returning
        } else {
            &self.prompts.routing_new
        }
    }

    pub fn domain_menu(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.prompts.domain_header,
            format_domain_options(),
            self.prompts.domain_footer
        )
    }

    pub fn refinement_menu(&self, domain: Domain) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            fill(&self.prompts.refinement_header, &[("domain", domain.label())]),
            format_refinement_options(domain),
            self.prompts.refinement_footer
        )
    }

    /// "Notice that {sensation}." for a chosen refinement.
    pub fn echo(&self, sensation: &str) -> String {
        fill(&self.prompts.echo, &[("sensation", sensation)])
    }

    /// Text of a 1-based dense layer.
    pub fn dense_layer(&self, layer: u8) -> Option<&str> {
        let idx = usize::from(layer).checked_sub(1)?;
        self.dense_layers.get(idx).map(String::as_str)
    }

    pub fn pattern(&self, pattern: EscapePattern) -> Option<&PatternText> {
        self.patterns.get(pattern.key())
    }

    /// Redirect line naming the pattern; the clarifier is included the first
    /// time the pattern comes up.
    pub fn redirect(&self, pattern: EscapePattern, first_time: bool) -> String {
        let (label, clarifier) = match self.pattern(pattern) {
            Some(text) => (text.label.as_str(), text.clarifier.as_str()),
            None => (pattern.key(), ""),
        };
        let template = if first_time {
            &self.redirect_first
        } else {
            &self.redirect_repeat
        };
        fill(template, &[("label", label), ("clarifier", clarifier)])
    }
}
