use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use questlog_core::TaskStatus;

#[derive(Parser)]
#[command(name = "questlog")]
#[command(about = "Plan the day, finish tasks, earn progress - offline first")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Device id stamped on tasks created here
    #[arg(long, global = true, value_name = "ID")]
    pub device_id: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// Due day: today, tomorrow, yesterday or YYYY-MM-DD
        #[arg(long, value_name = "DAY")]
        due: Option<String>,
    },
    /// List tasks, either for one day or most recent first
    List {
        /// Only tasks due on this day
        #[arg(long, value_name = "DAY")]
        due: Option<String>,
        /// Only tasks with this status (requires --due)
        #[arg(long, value_enum, requires = "due")]
        status: Option<StatusFilter>,
        /// Number of tasks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task done
    Done {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Move a done task back to pending
    Reopen {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Change a task title
    Rename {
        /// Task ID or unique ID prefix
        id: String,
        /// New title
        title: Vec<String>,
    },
    /// Move a task to another day
    Reschedule {
        /// Task ID or unique ID prefix
        id: String,
        /// New due day
        day: String,
    },
    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Show player progress
    Player {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Grant currency and experience
    Award {
        #[arg(long, default_value = "0")]
        currency: i64,
        #[arg(long, default_value = "0")]
        xp: i64,
    },
    /// Spend currency
    Spend { amount: i64 },
    /// Buy an item
    Unlock {
        item: String,
        #[arg(long)]
        cost: i64,
    },
    /// Claim a one-time reward
    Claim {
        reward: String,
        #[arg(long, default_value = "0")]
        currency: i64,
    },
    /// Show recent outbox entries
    Outbox {
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync cycle against the configured remote
    Sync,
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the background until Ctrl-C
    Watch,
    /// Resume sync after signing in again
    Reauth,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Done,
}

impl From<StatusFilter> for TaskStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Done => Self::Done,
        }
    }
}
