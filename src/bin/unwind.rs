//! `unwind` terminal driver.
//!
//! Runs a Mirror Mode session in the terminal: reads lines from stdin,
//! passes them through the engine, prints the reply, persists the session
//! record after every turn and writes a transcript on exit.
//!
//! Silence holds are honoured by waiting for input with a timeout; when the
//! hold runs out an empty utterance is submitted.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: "warn")
//! - `UNWIND_DB`: session database path (default: "unwind.db")
//! - `UNWIND_PROFILE`: profile name (default: "default")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin unwind
//! cargo run --bin unwind -- --fast --transcript-dir logs
//! cargo run --bin unwind -- --scenario happy_path
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use unwind::config::EngineConfig;
use unwind::engine::{Engine, HostSignal, Turn};
use unwind::memory::SessionMemory;
use unwind::scenarios;
use unwind::state::State;
use unwind::store::{SessionStore, SqliteSessionStore};
use unwind::transcript::Transcript;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Mirror Mode in the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "unwind")]
#[command(version, about, long_about = None)]
struct Args {
    /// Session database
    #[arg(long, env = "UNWIND_DB", default_value = "unwind.db")]
    db: PathBuf,

    /// Profile whose sessions are stored and resumed
    #[arg(long, env = "UNWIND_PROFILE", default_value = "default")]
    profile: String,

    /// Engine configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip silence holds
    #[arg(long)]
    fast: bool,

    /// Directory for JSON transcripts
    #[arg(long)]
    transcript_dir: Option<PathBuf>,

    /// Replay a built-in scenario and exit
    #[arg(long, conflicts_with = "list_scenarios")]
    scenario: Option<String>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list_scenarios: bool,
}

/// What the input reader produced.
enum Input {
    Line(String),
    Silence,
    Closed,
    Interrupted,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.fast {
        config = config.without_holds();
    }
    let engine = Engine::new(config)?;

    if args.list_scenarios {
        for scenario in scenarios::SCENARIOS {
            println!("{:<20} {}", scenario.name, scenario.description);
        }
        return Ok(());
    }

    if let Some(name) = &args.scenario {
        return replay(&engine, name);
    }

    run_session(&engine, &args)
}

/// Replay a scenario and print it.
fn replay(engine: &Engine, name: &str) -> anyhow::Result<()> {
    let scenario = scenarios::find(name)
        .ok_or_else(|| anyhow::anyhow!("unknown scenario '{}' (try --list-scenarios)", name))?;
    let run = scenarios::run(engine, scenario)?;

    for step in &run.steps {
        if let Some(input) = step.input {
            let shown = if input.is_empty() { "(silence)" } else { input };
            println!("> {}", shown);
        }
        println!(
            "[{:?} / {} / {}]",
            step.turn.next_state.phase(),
            step.turn.category,
            step.turn.next_state
        );
        render(&step.turn);
    }

    if run.passed() {
        println!("scenario {}: ok", scenario.name);
        Ok(())
    } else {
        anyhow::bail!(
            "scenario {} ended in {:?}, expected {}",
            scenario.name,
            run.final_state(),
            scenario.expected_final
        )
    }
}

/// Interactive session against the session store.
fn run_session(engine: &Engine, args: &Args) -> anyhow::Result<()> {
    let store = SqliteSessionStore::open(&args.db)
        .with_context(|| format!("failed to open session store {}", args.db.display()))?;
    let mut memory = starting_memory(&store, &args.profile)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }
    let input = spawn_stdin_reader();

    let mut transcript = Transcript::new(args.profile.as_str());
    let session_id = transcript.session_id.to_string();

    let mut turn = engine.open(&memory)?;
    loop {
        render(&turn);
        transcript.system(&turn);
        memory = turn.memory.clone();
        if let Err(e) = store.save_record(&args.profile, &session_id, &memory.to_record()) {
            log::warn!("failed to save session record: {}", e);
        }
        if turn.next_state == State::SessionEnd {
            break;
        }

        prompt_marker(turn.hold_secs);
        let utterance = match next_input(&input, turn.hold_secs, &stop) {
            Input::Line(line) => line,
            Input::Silence => String::new(),
            Input::Closed | Input::Interrupted => {
                log::info!("session interrupted in {}", memory.current_state());
                break;
            }
        };
        transcript.user(&utterance);

        turn = engine.take_turn(&utterance, &memory)?;
    }

    if let Some(dir) = &args.transcript_dir {
        let path = transcript.write_to_dir(dir)?;
        println!("Transcript: {}", path.display());
    }
    Ok(())
}

/// Resume an unfinished stored session, or start a new one.
fn starting_memory(store: &dyn SessionStore, profile: &str) -> anyhow::Result<SessionMemory> {
    let Some(record) = store.load_latest(profile)? else {
        return Ok(SessionMemory::new());
    };
    let stored = SessionMemory::from_record(&record)?;
    if stored.current_state() == State::SessionEnd {
        Ok(SessionMemory::returning())
    } else {
        log::info!("resuming stored session at {}", stored.current_state());
        Ok(stored)
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next line. With a hold, silence after `hold_secs` counts as
/// an (empty) answer.
fn next_input(rx: &Receiver<String>, hold_secs: Option<u64>, stop: &AtomicBool) -> Input {
    let deadline = hold_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        if stop.load(Ordering::SeqCst) {
            return Input::Interrupted;
        }
        let wait = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Input::Silence;
                }
                left.min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };
        match rx.recv_timeout(wait) {
            Ok(line) => return Input::Line(line),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Input::Closed,
        }
    }
}

fn render(turn: &Turn) {
    if !turn.display_text.is_empty() {
        println!("\n{}\n", turn.display_text);
    }
    if turn.signal == Some(HostSignal::Crisis) {
        println!("If you are in immediate danger, call your local emergency number now.\n");
    }
}

fn prompt_marker(hold_secs: Option<u64>) {
    match hold_secs {
        Some(secs) if secs > 0 => print!("(stay with it, {}s) > ", secs),
        _ => print!("> "),
    }
    let _ = std::io::stdout().flush();
}
