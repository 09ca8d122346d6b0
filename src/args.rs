use std::path::PathBuf;

use clap::Parser;

//
// Command line: `casey <course> [<assignment>]`.
//
#[derive(Parser, Debug)]
#[command(name = "casey", version, about = "Submit coursework and check scores", long_about = None)]
pub struct Args {
    /// Course identifier (letters, digits and `_`)
    pub course: Option<String>,

    /// Assignment to submit; omit to list scores for the course
    pub assignment: Option<String>,

    /// Configuration file (defaults to $CASEY_CONFIG or ~/.casey/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the request that would be sent instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Verbosity level (-v, -vv, -vvv); logs go to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
