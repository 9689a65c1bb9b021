use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration for a Chinook-style database
    Init {
        #[arg(long, help = "Path to the SQLite source database")]
        source_db: PathBuf,

        #[arg(long, help = "Items per batch request (1-25)")]
        batch_size: Option<usize>,

        #[arg(long, help = "Prefix prepended to every collection name")]
        table_prefix: Option<String>,

        #[arg(long, help = "Overwrite an existing configuration file")]
        force: bool,
    },
    /// Start a new migration run
    Migrate {
        #[arg(
            long,
            help = "Discard an unfinished run and drop and recreate target collections"
        )]
        force: bool,

        #[arg(long, num_args = 1.., help = "Only migrate these groups")]
        groups: Vec<String>,
    },
    /// Continue the unfinished run from its checkpoint
    Resume,
    /// Show the progress of the current run
    Status {
        #[arg(long, help = "Print the status as JSON instead of a table")]
        json: bool,
    },
    /// Compare target item counts against the checkpoint
    Validate {
        #[arg(long, help = "Only validate this group")]
        group: Option<String>,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Delete the checkpoint of the current run
    Reset {
        #[arg(long, help = "Confirm that the checkpoint should be deleted")]
        confirm: bool,
    },
    /// Pause the current run
    Pause,
    /// Describe the configured source, target and groups
    Info,
}
