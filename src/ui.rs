// UI layer: drives one invocation from raw arguments to the relayed reply.
//
//   validate -> [discover files] -> derive token -> build -> dispatch/relay
//
// Every failure is terminal; `report` prints it as one line prefixed with
// the program name.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::api::{is_plain_filename, ApiClient};
use crate::error::{ClientError, Result};
use crate::ident::{Identifier, IdentityProvider};

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub course: Option<String>,
    pub assignment: Option<String>,
    pub dry_run: bool,
}

impl Invocation {
    /// Checks course and assignment before anything touches the network.
    pub fn validate(&self) -> Result<(Identifier, Option<Identifier>)> {
        let course = match &self.course {
            Some(raw) => Identifier::parse("course", raw)?,
            None => return Err(ClientError::Usage("Course number required".into())),
        };
        let assignment = match &self.assignment {
            Some(raw) => Some(Identifier::parse("assignment", raw)?),
            None => None,
        };
        Ok((course, assignment))
    }
}

/// Spinner on stderr while waiting for the file list; hidden when stderr
/// is not a terminal.
fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Runs one invocation. The service reply (or, for a dry run, the request
/// description) is written to `out`; upload sources are read from `dir`.
pub fn run<I, W>(api: &ApiClient, ids: &I, inv: &Invocation, dir: &Path, date: NaiveDate, mut out: W) -> Result<()>
where
    I: IdentityProvider,
    W: Write,
{
    let (course, assignment) = inv.validate()?;

    let owner = ids.owner()?;
    debug!(%owner, %course, assignment = ?assignment.as_ref().map(Identifier::as_str), "validated");

    let filenames = match &assignment {
        Some(assignment) => {
            let pb = spinner("Querying file names...");
            let names = api.discover(&owner, &course, assignment);
            pb.finish_and_clear();
            let names = names.ok_or(ClientError::Discovery)?;
            if let Some(bad) = names.iter().find(|n| !is_plain_filename(n)) {
                return Err(ClientError::UnsafeFilename(bad.clone()));
            }
            Some(names)
        }
        None => None,
    };

    let username = ids.username()?;
    let token = api.token(&username, date);
    let req = api.build(&owner, &username, &token, &course, assignment.as_ref(), filenames.as_deref());

    if inv.dry_run {
        writeln!(out, "{}", req)?;
        return Ok(());
    }

    info!(%username, %course, files = req.filenames.len(), "sending request");
    api.dispatch(&req, dir, out).into_result(&req.filenames, api.timeout())
}

/// Prints `err` the way every failure is reported: `[program] message`.
pub fn report<W: Write>(program: &str, err: &ClientError, mut out: W) {
    let _ = writeln!(out, "[{}] {}", program, err);
    let _ = out.flush();
}
