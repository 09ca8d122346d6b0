// API client module: a small blocking HTTP client for the scoring service.
// It knows the two request shapes the service accepts:
//
// - filename discovery: GET owner/course/assignment/
// - scores / submission: owner/username/token/course/[assignment/]
//   (GET for a score query, POST with one multipart part per file when an
//   assignment is submitted)

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{multipart, Client};
use reqwest::{Method, Url};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::ident::Identifier;
use crate::relay::{is_timeout, relay, RelayError};
use crate::token;

/// Upper bound on the discovery reply; the service sends a single short line.
pub const MAX_LISTING_LEN: u64 = 4096;

/// Holds the reqwest blocking client, the service root and the secret
/// used to derive tokens.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    secret: String,
    timeout: Duration,
}

/// How a dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The reply was received in full and relayed.
    Completed,
    /// The request could not be assembled or started.
    InitFailed,
    /// An upload part could not be attached or sent.
    UploadFailed,
    /// Connection failure, broken reply, or a non-success status.
    Unreachable,
    /// The configured timeout elapsed.
    TimedOut,
    /// The reply could not be written to the invoker.
    OutputFailed(io::ErrorKind),
}

impl TransportOutcome {
    /// Maps the outcome into the client's error type. `filenames` are the
    /// upload parts of the request, reported on upload failure.
    pub fn into_result(self, filenames: &[String], timeout: Duration) -> Result<()> {
        match self {
            TransportOutcome::Completed => Ok(()),
            TransportOutcome::InitFailed => Err(ClientError::TransportInit(None)),
            TransportOutcome::UploadFailed => Err(ClientError::Upload {
                filenames: filenames.to_vec(),
            }),
            TransportOutcome::Unreachable => Err(ClientError::Connectivity(None)),
            TransportOutcome::TimedOut => Err(ClientError::Timeout(timeout.as_secs())),
            TransportOutcome::OutputFailed(kind) => Err(ClientError::Output(kind.into())),
        }
    }
}

/// One outgoing score-query or submission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub url: Url,
    /// Upload parts, in service order. Each part is named after the file
    /// it carries, read from the working directory.
    pub filenames: Vec<String>,
    submit: bool,
}

impl SubmissionRequest {
    /// POST when an assignment is being submitted, GET for a score query.
    pub fn method(&self) -> Method {
        if self.submit {
            Method::POST
        } else {
            Method::GET
        }
    }
}

impl fmt::Display for SubmissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.url)?;
        for name in &self.filenames {
            write!(f, " -F {0}=@{0}", name)?;
        }
        Ok(())
    }
}

/// Splits a discovery reply into filenames. Whitespace runs separate
/// names; a reply with no names at all means "absent".
pub fn parse_filenames(reply: &str) -> Option<Vec<String>> {
    let names: Vec<String> = reply.split_whitespace().map(str::to_string).collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// True for a bare file name that stays inside the working directory.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

impl ApiClient {
    /// Create an ApiClient for the service described by `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url())
            .map_err(|e| ClientError::Config(format!("bad service address {}: {}", config.base_url(), e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("bad service address {}", base_url)));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::TransportInit(Some(e)))?;
        Ok(ApiClient {
            client,
            base_url,
            secret: config.secret.clone(),
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Service root joined with `segments`, always ending in `/`.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments).push("");
        }
        url
    }

    /// Token for `username` on `date`, using the configured secret.
    pub fn token(&self, username: &str, date: NaiveDate) -> String {
        token::derive(username, &self.secret, date)
    }

    /// Ask the service which files `assignment` expects, in upload order.
    /// Any failure (unreachable service, error status, empty or oversized
    /// reply) yields `None`.
    pub fn discover(&self, owner: &str, course: &Identifier, assignment: &Identifier) -> Option<Vec<String>> {
        let url = self.url(&[owner, course.as_str(), assignment.as_str()]);
        debug!(%url, "querying file names");
        let res = match self.client.get(url).send() {
            Ok(res) => res,
            Err(e) => {
                warn!(error = %e, "file name query failed");
                return None;
            }
        };
        if !res.status().is_success() {
            warn!(status = %res.status(), "file name query rejected");
            return None;
        }
        // One byte past the limit tells a full listing from a cut one.
        let mut raw = Vec::new();
        if let Err(e) = res.take(MAX_LISTING_LEN + 1).read_to_end(&mut raw) {
            warn!(error = %e, "file name reply unreadable");
            return None;
        }
        if raw.len() as u64 > MAX_LISTING_LEN {
            warn!(limit = MAX_LISTING_LEN, "file name reply too long");
            return None;
        }
        let body = match String::from_utf8(raw) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "file name reply is not UTF-8");
                return None;
            }
        };
        let names = parse_filenames(&body);
        debug!(?names, "file names");
        names
    }

    /// Compose the request. Filenames only count alongside an assignment.
    pub fn build(
        &self,
        owner: &str,
        username: &str,
        token: &str,
        course: &Identifier,
        assignment: Option<&Identifier>,
        filenames: Option<&[String]>,
    ) -> SubmissionRequest {
        let mut segments = vec![owner, username, token, course.as_str()];
        if let Some(a) = assignment {
            segments.push(a.as_str());
        }
        let filenames = match (assignment, filenames) {
            (Some(_), Some(names)) => names.to_vec(),
            _ => Vec::new(),
        };
        SubmissionRequest {
            url: self.url(&segments),
            filenames,
            submit: assignment.is_some(),
        }
    }

    /// Attach every upload part, reading files from `dir`.
    fn form(&self, req: &SubmissionRequest, dir: &Path) -> Option<multipart::Form> {
        let mut form = multipart::Form::new();
        for name in &req.filenames {
            let path = dir.join(name);
            if !path.is_file() {
                warn!(file = %path.display(), "file not found");
                return None;
            }
            let file = match std::fs::File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot open file");
                    return None;
                }
            };
            let part = match file.metadata() {
                Ok(meta) => multipart::Part::reader_with_length(file, meta.len()),
                Err(_) => multipart::Part::reader(file),
            };
            let part = part.file_name(name.clone());
            form = form.part(name.clone(), part);
        }
        Some(form)
    }

    /// Send `req` and stream the reply into `out` as it arrives.
    pub fn dispatch<W: Write>(&self, req: &SubmissionRequest, dir: &Path, out: W) -> TransportOutcome {
        let mut builder = self.client.request(req.method(), req.url.clone());
        if req.submit {
            match self.form(req, dir) {
                Some(form) => builder = builder.multipart(form),
                None => return TransportOutcome::UploadFailed,
            }
        }
        debug!(method = %req.method(), url = %req.url, parts = req.filenames.len(), "dispatching");

        let res = match builder.send() {
            Ok(res) => res,
            Err(e) => return self.classify(&e, req),
        };
        let status = res.status();
        if !status.is_success() {
            warn!(%status, "service returned an error status");
        }

        match relay(res, out) {
            Ok(n) => debug!(bytes = n, "reply relayed"),
            Err(RelayError::Read(e)) if is_timeout(&e) => {
                warn!(error = %e, "reply timed out");
                return TransportOutcome::TimedOut;
            }
            Err(RelayError::Read(e)) => {
                warn!(error = %e, "reply interrupted");
                return TransportOutcome::Unreachable;
            }
            Err(RelayError::Write(e)) => {
                warn!(error = %e, "cannot write reply");
                return TransportOutcome::OutputFailed(e.kind());
            }
        }

        if status.is_success() {
            TransportOutcome::Completed
        } else {
            TransportOutcome::Unreachable
        }
    }

    fn classify(&self, e: &reqwest::Error, req: &SubmissionRequest) -> TransportOutcome {
        warn!(error = %e, "request failed");
        if e.is_timeout() {
            TransportOutcome::TimedOut
        } else if e.is_builder() {
            TransportOutcome::InitFailed
        } else if e.is_connect() {
            TransportOutcome::Unreachable
        } else if e.is_body() && !req.filenames.is_empty() {
            TransportOutcome::UploadFailed
        } else {
            TransportOutcome::Unreachable
        }
    }
}
