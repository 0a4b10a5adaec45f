//! Session memory and its flat persistence record.
//!
//! [`SessionMemory`] is the only mutable state of a conversation. It is
//! owned by the caller and passed into every turn by reference; the engine
//! works on a clone and hands the updated value back in the turn output, so
//! a rejected turn can never leave a half-applied change behind.
//!
//! Mutation goes through [`MemoryDelta`]s, each checked against the memory
//! invariants before it is applied:
//!
//! - `spaciousness_check_done` flips false to true at most once
//! - `successful_stays_count` never decreases
//! - `layer_index` is 0 outside the dense path and advances one layer at a
//!   time up to the configured layer count
//! - `sensation_tree_path` only grows within an episode

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::classifier::EscapePattern;
use crate::error::{EngineError, RecordError};
use crate::state::State;

/// Hard ceiling for `layer_index` in decoded records.
pub const MAX_DENSE_LAYERS: u8 = 4;

/// Number of orientation screens.
pub const ORIENTATION_SCREENS: usize = 13;

// ---------------------------------------------------------------------------
// SessionMemory
// ---------------------------------------------------------------------------

/// Counters, flags and position of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMemory {
    current_state: State,
    orientation_screen_index: usize,
    sensation_tree_path: Vec<String>,
    layer_index: u8,
    successful_stays_count: u32,
    spaciousness_check_done: bool,
    returning_user: bool,
    mirror_engaged: bool,
    offapp_given: bool,
    explained_patterns: BTreeSet<EscapePattern>,
    resume_state: Option<State>,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMemory {
    /// Fresh memory for a first-time user.
    pub fn new() -> Self {
        Self {
            current_state: State::Entry,
            orientation_screen_index: 0,
            sensation_tree_path: Vec::new(),
            layer_index: 0,
            successful_stays_count: 0,
            spaciousness_check_done: false,
            returning_user: false,
            mirror_engaged: false,
            offapp_given: false,
            explained_patterns: BTreeSet::new(),
            resume_state: None,
        }
    }

    /// Fresh memory for a user with a stored session.
    pub fn returning() -> Self {
        Self {
            returning_user: true,
            ..Self::new()
        }
    }

    pub fn current_state(&self) -> State {
        self.current_state
    }

    pub fn orientation_screen_index(&self) -> usize {
        self.orientation_screen_index
    }

    pub fn sensation_tree_path(&self) -> &[String] {
        &self.sensation_tree_path
    }

    /// Current dense layer (1..=4), or 0 outside the dense path.
    pub fn layer_index(&self) -> u8 {
        self.layer_index
    }

    pub fn successful_stays_count(&self) -> u32 {
        self.successful_stays_count
    }

    pub fn spaciousness_check_done(&self) -> bool {
        self.spaciousness_check_done
    }

    pub fn returning_user(&self) -> bool {
        self.returning_user
    }

    pub fn mirror_engaged(&self) -> bool {
        self.mirror_engaged
    }

    pub fn offapp_given(&self) -> bool {
        self.offapp_given
    }

    pub fn explained_patterns(&self) -> &BTreeSet<EscapePattern> {
        &self.explained_patterns
    }

    pub fn has_explained(&self, pattern: EscapePattern) -> bool {
        self.explained_patterns.contains(&pattern)
    }

    /// State to return to when the user resumes after a crisis response.
    pub fn resume_state(&self) -> Option<State> {
        self.resume_state
    }

    /// Apply deltas in order. On error `self` may be partially updated, so
    /// callers apply to a scratch clone.
    pub(crate) fn apply_all(
        &mut self,
        deltas: &[MemoryDelta],
        max_layers: u8,
    ) -> Result<(), EngineError> {
        for delta in deltas {
            self.apply(delta, max_layers)?;
        }
        Ok(())
    }

    fn apply(&mut self, delta: &MemoryDelta, max_layers: u8) -> Result<(), EngineError> {
        match delta {
            MemoryDelta::SetState(state) => self.current_state = *state,
            MemoryDelta::AdvanceOrientation => self.orientation_screen_index += 1,
            MemoryDelta::RestartOrientation => self.orientation_screen_index = 0,
            MemoryDelta::StartEpisode => {
                self.sensation_tree_path.clear();
                self.layer_index = 0;
            }
            MemoryDelta::PushPath(choice) => self.sensation_tree_path.push(choice.clone()),
            MemoryDelta::EnterDenseLayer => {
                if self.layer_index >= max_layers {
                    return Err(invalid(
                        "layer_index",
                        format!("already at the last layer ({})", max_layers),
                    ));
                }
                self.layer_index += 1;
            }
            MemoryDelta::LeaveDensePath => self.layer_index = 0,
            MemoryDelta::RecordSpaciousStay => {
                self.successful_stays_count = self
                    .successful_stays_count
                    .checked_add(1)
                    .ok_or_else(|| invalid("successful_stays_count", "overflow".to_string()))?;
            }
            MemoryDelta::MarkSpaciousnessCheck => {
                if self.spaciousness_check_done {
                    return Err(invalid(
                        "spaciousness_check_done",
                        "the check already ran this session".to_string(),
                    ));
                }
                self.spaciousness_check_done = true;
            }
            MemoryDelta::MarkPatternExplained(pattern) => {
                self.explained_patterns.insert(*pattern);
            }
            MemoryDelta::MarkMirrorEngaged => self.mirror_engaged = true,
            MemoryDelta::MarkHandoffGiven => self.offapp_given = true,
            MemoryDelta::SetResume(state) => self.resume_state = Some(*state),
            MemoryDelta::TakeResume => self.resume_state = None,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Flatten into a persistence record.
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            state: self.current_state.to_string(),
            orientation_screen_index: self.orientation_screen_index,
            sensation_tree_path: self.sensation_tree_path.clone(),
            layer_index: self.layer_index,
            successful_stays_count: self.successful_stays_count,
            spaciousness_check_done: self.spaciousness_check_done,
            returning_user: self.returning_user,
            mirror_engaged: self.mirror_engaged,
            offapp_given: self.offapp_given,
            explained_patterns: self
                .explained_patterns
                .iter()
                .map(|p| p.key().to_string())
                .collect(),
            resume_state: self.resume_state.map(|s| s.to_string()),
        }
    }

    /// Rebuild memory from a persistence record.
    ///
    /// The stored state must agree with the stored counters: a record that
    /// could not have been produced by a session is rejected.
    pub fn from_record(record: &SessionRecord) -> Result<Self, RecordError> {
        if record.layer_index > MAX_DENSE_LAYERS {
            return Err(RecordError::OutOfRange {
                field: "layer_index",
                reason: format!("{} > {}", record.layer_index, MAX_DENSE_LAYERS),
            });
        }
        if record.orientation_screen_index > ORIENTATION_SCREENS {
            return Err(RecordError::OutOfRange {
                field: "orientation_screen_index",
                reason: format!(
                    "{} > {}",
                    record.orientation_screen_index, ORIENTATION_SCREENS
                ),
            });
        }
        let explained_patterns = record
            .explained_patterns
            .iter()
            .map(|key| {
                EscapePattern::from_key(key).ok_or_else(|| RecordError::Unparsable {
                    field: "explained_patterns",
                    value: key.clone(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        let resume_state = record
            .resume_state
            .as_deref()
            .map(str::parse::<State>)
            .transpose()?;

        let current_state: State = record.state.parse()?;
        check_state_fields(current_state, record)?;

        Ok(Self {
            current_state,
            orientation_screen_index: record.orientation_screen_index,
            sensation_tree_path: record.sensation_tree_path.clone(),
            layer_index: record.layer_index,
            successful_stays_count: record.successful_stays_count,
            spaciousness_check_done: record.spaciousness_check_done,
            returning_user: record.returning_user,
            mirror_engaged: record.mirror_engaged,
            offapp_given: record.offapp_given,
            explained_patterns,
            resume_state,
        })
    }
}

/// Per-state constraints on the decoded counters.
fn check_state_fields(state: State, record: &SessionRecord) -> Result<(), RecordError> {
    if state == State::Orientation && record.orientation_screen_index >= ORIENTATION_SCREENS {
        return Err(RecordError::OutOfRange {
            field: "orientation_screen_index",
            reason: format!(
                "{} has no screen in {}",
                record.orientation_screen_index, state
            ),
        });
    }
    if state == State::DenseLayer && record.layer_index == 0 {
        return Err(RecordError::OutOfRange {
            field: "layer_index",
            reason: format!("0 in {}", state),
        });
    }
    let dense_path = matches!(
        state,
        State::DenseLayer
            | State::SensoryFork
            | State::DenseContinueOrStop
            | State::CrisisResponse
            | State::SessionEnd
    );
    if record.layer_index > 0 && !dense_path {
        return Err(RecordError::OutOfRange {
            field: "layer_index",
            reason: format!("{} outside the dense path ({})", record.layer_index, state),
        });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: String) -> EngineError {
    EngineError::InvalidMemory { field, reason }
}

// ---------------------------------------------------------------------------
// MemoryDelta
// ---------------------------------------------------------------------------

/// One atomic change to session memory, produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemoryDelta {
    SetState(State),
    AdvanceOrientation,
    /// Start orientation over for a review.
    RestartOrientation,
    /// New Mirror Mode episode: clears the tree path and dense layer.
    StartEpisode,
    PushPath(String),
    EnterDenseLayer,
    LeaveDensePath,
    RecordSpaciousStay,
    MarkSpaciousnessCheck,
    MarkPatternExplained(EscapePattern),
    MarkMirrorEngaged,
    MarkHandoffGiven,
    SetResume(State),
    TakeResume,
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

const LIST_SEPARATOR: &str = "|";

/// Flat, storage-agnostic form of [`SessionMemory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub state: String,
    pub orientation_screen_index: usize,
    pub sensation_tree_path: Vec<String>,
    pub layer_index: u8,
    pub successful_stays_count: u32,
    pub spaciousness_check_done: bool,
    pub returning_user: bool,
    pub mirror_engaged: bool,
    pub offapp_given: bool,
    pub explained_patterns: Vec<String>,
    pub resume_state: Option<String>,
}

impl SessionRecord {
    /// Key/value form. Lists are joined with `|`; an absent resume state is
    /// an empty string.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("state".to_string(), self.state.clone());
        map.insert(
            "orientation_screen_index".to_string(),
            self.orientation_screen_index.to_string(),
        );
        map.insert(
            "sensation_tree_path".to_string(),
            join_list(&self.sensation_tree_path),
        );
        map.insert("layer_index".to_string(), self.layer_index.to_string());
        map.insert(
            "successful_stays_count".to_string(),
            self.successful_stays_count.to_string(),
        );
        map.insert(
            "spaciousness_check_done".to_string(),
            self.spaciousness_check_done.to_string(),
        );
        map.insert("returning_user".to_string(), self.returning_user.to_string());
        map.insert("mirror_engaged".to_string(), self.mirror_engaged.to_string());
        map.insert("offapp_given".to_string(), self.offapp_given.to_string());
        map.insert(
            "explained_patterns".to_string(),
            join_list(&self.explained_patterns),
        );
        map.insert(
            "resume_state".to_string(),
            self.resume_state.clone().unwrap_or_default(),
        );
        map
    }

    /// Inverse of [`to_map`](Self::to_map).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, RecordError> {
        let resume_state = field(map, "resume_state")?;
        Ok(Self {
            state: field(map, "state")?.to_string(),
            orientation_screen_index: parse_field(map, "orientation_screen_index")?,
            sensation_tree_path: split_list(field(map, "sensation_tree_path")?),
            layer_index: parse_field(map, "layer_index")?,
            successful_stays_count: parse_field(map, "successful_stays_count")?,
            spaciousness_check_done: parse_field(map, "spaciousness_check_done")?,
            returning_user: parse_field(map, "returning_user")?,
            mirror_engaged: parse_field(map, "mirror_engaged")?,
            offapp_given: parse_field(map, "offapp_given")?,
            explained_patterns: split_list(field(map, "explained_patterns")?),
            resume_state: (!resume_state.is_empty()).then(|| resume_state.to_string()),
        })
    }
}

fn field<'a>(map: &'a BTreeMap<String, String>, name: &'static str) -> Result<&'a str, RecordError> {
    map.get(name)
        .map(String::as_str)
        .ok_or(RecordError::MissingField(name))
}

fn parse_field<T: std::str::FromStr>(
    map: &BTreeMap<String, String>,
    name: &'static str,
) -> Result<T, RecordError> {
    let raw = field(map, name)?;
    raw.parse().map_err(|_| RecordError::Unparsable {
        field: name,
        value: raw.to_string(),
    })
}

fn join_list(items: &[String]) -> String {
    items.join(LIST_SEPARATOR)
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(LIST_SEPARATOR).map(str::to_string).collect()
}
