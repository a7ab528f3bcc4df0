use clap::Parser;
use continuumcon_ics::Options;
use std::path::PathBuf;

/// Build the ContinuumCon attendee calendar from the schedule.
#[derive(Parser, Debug)]
#[command(name = "continuumcon-ics", version, about)]
pub struct Cli {
    /// Schedule document to read (and update with new UIDs)
    #[arg(long, default_value = "schedule.yaml")]
    pub schedule: PathBuf,

    /// Calendar file to write
    #[arg(long, default_value = "schedule.ics")]
    pub output: PathBuf,

    /// Timezone for session times when the schedule doesn't name one
    #[arg(long, env = "CONFERENCE_TZ")]
    pub timezone: Option<String>,

    /// Don't assign missing UIDs or rewrite the schedule
    #[arg(long)]
    pub no_backfill: bool,

    /// Show debug diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            schedule_path: self.schedule.clone(),
            output_path: self.output.clone(),
            timezone: self.timezone.clone(),
            backfill: !self.no_backfill,
        }
    }
}
