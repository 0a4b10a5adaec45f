//! Sensation vocabulary: ten domains, each with its refinement list.
//!
//! The domain menu and the refinement menus are built from these tables
//! (see [`crate::lexicon::menus`]); the engine renders them as numbered
//! lists and records the choices in the session's sensation-tree path.

use std::fmt;

/// A sensation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Pressure,
    Texture,
    Movement,
    Temperature,
    Density,
    Energy,
    Shape,
    Location,
    Intensity,
    Neutral,
}

impl Domain {
    /// Menu order.
    pub const ALL: [Domain; 10] = [
        Domain::Pressure,
        Domain::Texture,
        Domain::Movement,
        Domain::Temperature,
        Domain::Density,
        Domain::Energy,
        Domain::Shape,
        Domain::Location,
        Domain::Intensity,
        Domain::Neutral,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Domain::Pressure => "pressure",
            Domain::Texture => "texture",
            Domain::Movement => "movement",
            Domain::Temperature => "temperature",
            Domain::Density => "density",
            Domain::Energy => "energy",
            Domain::Shape => "shape",
            Domain::Location => "location",
            Domain::Intensity => "intensity",
            Domain::Neutral => "neutral",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Domain::Pressure => "Pressure / Force",
            Domain::Texture => "Texture",
            Domain::Movement => "Movement",
            Domain::Temperature => "Temperature",
            Domain::Density => "Density / Weight",
            Domain::Energy => "Vibration / Energy",
            Domain::Shape => "Shape / Boundary",
            Domain::Location => "Location / Spread",
            Domain::Intensity => "Intensity",
            Domain::Neutral => "Neutral / Unclear",
        }
    }

    /// Noun used when echoing a refinement back ("tight pressure").
    pub fn noun(self) -> &'static str {
        match self {
            Domain::Pressure => "pressure",
            Domain::Texture => "texture",
            Domain::Movement => "movement",
            Domain::Temperature => "temperature",
            Domain::Density => "weight",
            Domain::Energy => "energy",
            Domain::Shape => "shape",
            Domain::Location => "spread",
            Domain::Intensity => "intensity",
            Domain::Neutral => "sensation",
        }
    }

    pub fn refinements(self) -> &'static [&'static str] {
        match self {
            Domain::Pressure => &[
                "Tight",
                "Compressed",
                "Expanding",
                "Contracting",
                "Squeezing",
                "Pressing outward",
                "Pulling inward",
                "Pulsing pressure",
            ],
            Domain::Texture => &[
                "Smooth", "Rough", "Sharp", "Dull", "Grainy", "Sticky", "Slippery", "Prickly",
                "Fibrous", "Thick", "Thin", "Muddy", "Clear",
            ],
            Domain::Movement => &[
                "Still",
                "Trembling",
                "Vibrating",
                "Swirling",
                "Rising",
                "Sinking",
                "Flickering",
                "Spreading",
                "Contracting",
                "Jerky",
                "Flowing",
            ],
            Domain::Temperature => &[
                "Warm",
                "Cool",
                "Hot",
                "Cold",
                "Fluctuating",
                "Neutral",
                "Localized warmth",
                "Radiating heat",
            ],
            Domain::Density => &[
                "Heavy",
                "Light",
                "Thick",
                "Thin",
                "Dense",
                "Hollow",
                "Solid",
                "Airy",
                "Weighted",
                "Pressurized",
            ],
            Domain::Energy => &[
                "Buzzing",
                "Humming",
                "Tingling",
                "Electric",
                "Static",
                "Fizzing",
                "Pulsing",
                "Quiet energy",
                "Diffuse energy",
            ],
            Domain::Shape => &[
                "Tight ball",
                "Band",
                "Knot",
                "Cloud",
                "Sheet",
                "Line",
                "Block",
                "Ring",
                "Undefined shape",
                "No clear edge",
            ],
            Domain::Location => &[
                "Localized",
                "Central",
                "Peripheral",
                "Spreading outward",
                "Moving location",
                "Fixed spot",
                "Diffuse",
                "Whole-body",
                "Front / back / sides",
            ],
            Domain::Intensity => &[
                "Faint",
                "Moderate",
                "Strong",
                "Surging",
                "Peaking",
                "Diminishing",
                "Steady",
                "Fluctuating",
            ],
            Domain::Neutral => &[
                "Hard to describe",
                "Vague",
                "Blank",
                "Quiet",
                "Numb-adjacent",
                "Indistinct",
                "Nothing specific",
            ],
        }
    }

    /// Whether choosing this domain ends the tree without a refinement step.
    pub fn is_leaf(self) -> bool {
        self == Domain::Neutral
    }

    /// Domain at a 1-based menu position.
    pub fn at(position: u8) -> Option<Domain> {
        let idx = usize::from(position).checked_sub(1)?;
        Self::ALL.get(idx).copied()
    }

    /// Refinement label at a 1-based menu position.
    pub fn refinement_at(self, position: u8) -> Option<&'static str> {
        let idx = usize::from(position).checked_sub(1)?;
        self.refinements().get(idx).copied()
    }

    pub fn from_key(key: &str) -> Option<Domain> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Render the domain menu body ("1) Pressure / Force\n2) Texture...").
pub fn format_domain_options() -> String {
    numbered_lines(Domain::ALL.iter().map(|d| d.label()))
}

/// Render a refinement menu body.
pub fn format_refinement_options(domain: Domain) -> String {
    numbered_lines(domain.refinements().iter().copied())
}

fn numbered_lines<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels
        .enumerate()
        .map(|(i, label)| format!("{}) {}", i + 1, label))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Echo phrase for a chosen refinement, e.g. "tight pressure".
pub fn echo_phrase(domain: Domain, refinement: &str) -> String {
    format!("{} {}", refinement.to_lowercase(), domain.noun())
}
