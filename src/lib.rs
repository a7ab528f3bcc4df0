//! Generates the ContinuumCon attendee calendar from the schedule document.
//!
//! The pipeline is load → backfill UIDs → render → write → validate. See
//! [`run`].

pub mod error;
pub mod render;
pub mod schedule;
pub mod uid;
pub mod validate;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use error::{ScheduleError, ScheduleResult};
use render::{render_events, to_calendar, MissingUid, Rendered};
use schedule::Schedule;
use uid::backfill_uids;
use validate::{validate, Mismatch};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_VALIDATION_FAILED: u8 = 2;
pub const EXIT_MISSING_UIDS: u8 = 3;

#[derive(Debug, Clone)]
pub struct Options {
    pub schedule_path: PathBuf,
    pub output_path: PathBuf,
    /// Used when the schedule names no timezone of its own.
    pub timezone: Option<String>,
    /// Assign missing UIDs and rewrite the schedule document.
    pub backfill: bool,
}

/// How a run ended, short of a fatal error.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Success { events: usize },
    ValidationFailed(Vec<Mismatch>),
    MissingUids { events: usize, missing: Vec<MissingUid> },
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success { .. } => EXIT_SUCCESS,
            Outcome::ValidationFailed(_) => EXIT_VALIDATION_FAILED,
            Outcome::MissingUids { .. } => EXIT_MISSING_UIDS,
        }
    }

    /// Print the result for the operator: successes on stdout, problem
    /// listings on stderr.
    pub fn report(&self) {
        match self {
            Outcome::Success { events } => {
                println!("Calendar validated: {} events match the schedule", events);
            }
            Outcome::ValidationFailed(errors) => {
                eprintln!("Calendar validation failed with {} error(s):", errors.len());
                for error in errors {
                    eprintln!("  - {}", error);
                }
            }
            Outcome::MissingUids { events, missing } => {
                println!("Calendar validated: {} events match the schedule", events);
                eprintln!(
                    "{} session(s) were left out because they have no UID:",
                    missing.len()
                );
                for session in missing {
                    eprintln!("  - {}", session);
                }
            }
        }
    }
}

fn write_calendar(path: &Path, contents: &str) -> ScheduleResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ScheduleError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| ScheduleError::io(path, e))
}

/// Run the whole pipeline, stamping the calendar with the current time.
pub fn run(options: &Options) -> ScheduleResult<Outcome> {
    run_at(options, Utc::now())
}

pub fn run_at(options: &Options, generated_at: DateTime<Utc>) -> ScheduleResult<Outcome> {
    let mut schedule = Schedule::load(&options.schedule_path)?;
    let tz = schedule.resolve_timezone(options.timezone.as_deref())?;
    debug!(timezone = tz.name(), "resolved conference timezone");

    if options.backfill {
        let assigned = backfill_uids(&mut schedule);
        if assigned > 0 {
            schedule.save(&options.schedule_path)?;
            println!(
                "Assigned {} new session UID(s); updated {}",
                assigned,
                options.schedule_path.display()
            );
        }
    }

    let rendered = render_events(&schedule, tz);
    let calendar = to_calendar(&rendered.events, tz, generated_at);
    write_calendar(&options.output_path, &calendar)?;
    info!(
        events = rendered.events.len(),
        missing_uids = rendered.missing_uids.len(),
        "rendered calendar"
    );
    println!(
        "Wrote {} events to {}",
        rendered.events.len(),
        options.output_path.display()
    );

    let written = fs::read_to_string(&options.output_path)
        .map_err(|e| ScheduleError::io(&options.output_path, e))?;
    let errors = validate(&written, &rendered.events);
    Ok(conclude(errors, rendered))
}

/// Validation errors outrank sessions left out for missing UIDs.
fn conclude(errors: Vec<Mismatch>, rendered: Rendered) -> Outcome {
    if !errors.is_empty() {
        return Outcome::ValidationFailed(errors);
    }

    let events = rendered.events.len();
    if !rendered.missing_uids.is_empty() {
        return Outcome::MissingUids {
            events,
            missing: rendered.missing_uids,
        };
    }
    Outcome::Success { events }
}
