// Entrypoint for the CLI application.
// - Keeps `main` small: parse args, set up logging and configuration,
//   build the API client and hand everything to `ui::run`.
// - Any failure becomes one `[program] message` line and exit status 255.

use std::process::ExitCode;

use anyhow::Context;
use casey_client::{
    api::ApiClient,
    args::Args,
    config::Config,
    error::{ClientError, FAILURE_STATUS},
    ident::SystemIdentity,
    token,
    ui::{self, Invocation},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(args: &Args) -> anyhow::Result<()> {
    let inv = Invocation {
        course: args.course.clone(),
        assignment: args.assignment.clone(),
        dry_run: args.dry_run,
    };
    inv.validate()?;

    let config = Config::load(args.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");
    let api = ApiClient::new(&config)?;
    let dir = std::env::current_dir().context("Failed to determine working directory")?;
    ui::run(&api, &SystemIdentity, &inv, &dir, token::today(), std::io::stdout().lock())?;
    Ok(())
}

fn main() -> ExitCode {
    let program = std::env::args().next().unwrap_or_else(|| "casey".into());

    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version print and exit successfully.
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(FAILURE_STATUS);
        }
    };
    init_logging(args.verbose);

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "invocation failed");
            match e.downcast_ref::<ClientError>() {
                Some(err) => ui::report(&program, err, std::io::stdout()),
                None => println!("[{}] {:#}", program, e),
            }
            ExitCode::from(FAILURE_STATUS)
        }
    }
}
