use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Compliance console: browse, triage, complete and archive requirements")]
pub struct Cli {
    /// Raw navigation query, e.g. "status=PENDING_REVIEW&page=2"
    #[clap(long, short = 'q', global = true)]
    pub query: Option<String>,

    /// Answer yes to every confirmation
    #[clap(long, short = 'y', global = true)]
    pub yes: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

/// Filter flags, encoded into the navigation query
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Status buckets: active, completed, triage, archived (comma separated)
    #[clap(long)]
    pub status: Option<String>,

    /// Due windows: overdue, due_7, due_30 (comma separated)
    #[clap(long)]
    pub due: Option<String>,

    /// Page number (1-based)
    #[clap(long)]
    pub page: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the path to the configuration file
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List requirements for the current filters
    List {
        #[clap(flatten)]
        filters: FilterArgs,
    },

    /// Keep the list on screen and refresh it in the background
    Watch {
        #[clap(flatten)]
        filters: FilterArgs,
    },

    /// Show details for a requirement
    Show {
        /// Requirement ID
        id: String,
    },

    /// Mark a requirement as complete
    Complete {
        /// Requirement ID
        id: String,
    },

    /// Archive a requirement
    Archive {
        /// Requirement ID
        id: String,

        /// Archive reason (prompted when omitted)
        #[clap(long)]
        reason: Option<String>,
    },

    /// Restore an archived requirement
    Restore {
        /// Requirement ID
        id: String,
    },

    /// Archive requirements awaiting triage with one shared reason
    Dismiss {
        /// Requirement IDs on the current page
        ids: Vec<String>,

        /// Select every requirement awaiting triage on the page
        #[clap(long)]
        all: bool,

        /// Shared reason (prompted when omitted)
        #[clap(long)]
        reason: Option<String>,
    },

    /// Triage one requirement, or several at once
    Triage {
        /// Requirement IDs; more than one saves them as a batch
        ids: Vec<String>,

        /// Status to set (OPEN, REVIEW, PENDING_REVIEW, READY, DONE)
        #[clap(long)]
        status: Option<String>,

        /// Frequency (e.g. MONTHLY, EVERY_N_WEEKS)
        #[clap(long)]
        frequency: Option<String>,

        /// Anchor type (UPLOAD_DATE, ISSUE_DATE, CALENDAR, FIRST_COMPLETION, CUSTOM_DATE)
        #[clap(long)]
        anchor_type: Option<String>,

        /// Anchor reference date (YYYY-MM-DD)
        #[clap(long)]
        anchor_date: Option<String>,

        /// Interval for the EVERY_N_* frequencies
        #[clap(long)]
        interval: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[clap(long)]
        due: Option<String>,

        /// Assignee
        #[clap(long)]
        assignee: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long, short = 'i')]
        interactive: bool,
    },

    /// Show the signed-in user
    Whoami,

    /// Wait for an uploaded document to finish processing
    PollDocument {
        /// Document ID
        id: String,
    },

    /// Manage the console configuration
    #[clap(subcommand)]
    Config(ConfigCommand),
}
