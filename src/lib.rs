//! # Unwind
//!
//! Deterministic Mirror Mode dialogue engine.
//! Version 2.5.0
//!
//! Two pieces carry all the logic: an escape-pattern classifier that sorts
//! each utterance into a closed set of categories (story, crisis, menu
//! answer, sensation report, ...), and a fixed-topology conversation state
//! machine gated by those categories and by per-session memory. Everything
//! else here (screen text, the session store, transcripts, the terminal
//! driver) is plumbing around [`Engine::take_turn`].
//!
//! ```
//! use unwind::{Engine, SessionMemory, State};
//!
//! let engine = Engine::default();
//! let turn = engine.open(&SessionMemory::returning()).unwrap();
//! assert_eq!(turn.next_state, State::Routing);
//!
//! let turn = engine.take_turn("1", &turn.memory).unwrap();
//! assert_eq!(turn.next_state, State::MirrorCentralView);
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod memory;
pub mod scenarios;
pub mod sensation_tree;
pub mod state;
pub mod store;
pub mod transcript;
pub mod translations;

pub use classifier::{classify, classify_detailed, Category, Classification, EscapePattern};
pub use config::EngineConfig;
pub use engine::{Engine, HostSignal, Turn};
pub use error::{ConfigError, EngineError, RecordError};
pub use memory::{SessionMemory, SessionRecord};
pub use state::State;
pub use store::{SessionStore, SqliteSessionStore};
