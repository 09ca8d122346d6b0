// Library root
// -----------
// Client for the Casey coursework scoring service. The binary (`main.rs`)
// parses arguments, loads configuration and hands off to `ui::run`.
//
// Module responsibilities:
// - `api`: HTTP exchanges with the service (file name discovery, score
//   query, multipart submission) and transport outcome mapping.
// - `args`: command line surface.
// - `config`: service address, shared secret and timeout.
// - `error`: the closed set of failures an invocation can end with.
// - `ident`: course/assignment validation and account name lookup.
// - `relay`: streams the service reply to the terminal.
// - `token`: the daily authentication token.
// - `ui`: one invocation, start to finish, plus error reporting.
pub mod api;
pub mod args;
pub mod config;
pub mod error;
pub mod ident;
pub mod relay;
pub mod token;
pub mod ui;
