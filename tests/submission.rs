use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

use casey_client::api::{ApiClient, TransportOutcome};
use casey_client::config::Config;
use casey_client::error::ClientError;
use casey_client::ident::{Identifier, StaticIdentity};
use casey_client::token;
use casey_client::ui::{self, Invocation};
use chrono::NaiveDate;
use mockito::Matcher;

// Every test uses its own owner name so mocks never overlap on the shared
// mockito server.

fn make_config(timeout: Duration) -> Config {
    let addr = mockito::server_address();
    Config {
        scheme: "http".into(),
        host: addr.ip().to_string(),
        port: addr.port(),
        secret: "course-secret".into(),
        timeout,
    }
}

fn make_client() -> ApiClient {
    ApiClient::new(&make_config(Duration::from_secs(5))).unwrap()
}

fn ident(s: &str) -> Identifier {
    Identifier::parse("test", s).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
}

fn identity(owner: &str) -> StaticIdentity {
    StaticIdentity {
        owner: owner.into(),
        username: "alice".into(),
    }
}

fn submit(course: &str, assignment: &str) -> Invocation {
    Invocation {
        course: Some(course.into()),
        assignment: Some(assignment.into()),
        dry_run: false,
    }
}

#[test]
fn discovery_lists_files_in_service_order() {
    let m = mockito::mock("GET", "/prof_list/cs101/hw1/")
        .with_body("a.py b.py c.py\n")
        .create();

    let names = make_client().discover("prof_list", &ident("cs101"), &ident("hw1"));
    assert_eq!(names, Some(vec!["a.py".into(), "b.py".into(), "c.py".into()]));
    m.assert();
}

#[test]
fn empty_discovery_is_absent() {
    let _m = mockito::mock("GET", "/prof_empty/cs101/hw1/").with_body("").create();
    assert_eq!(make_client().discover("prof_empty", &ident("cs101"), &ident("hw1")), None);
}

#[test]
fn discovery_error_status_is_absent() {
    let _m = mockito::mock("GET", "/prof_err/cs101/hw1/")
        .with_status(500)
        .with_body("a.py\n")
        .create();
    assert_eq!(make_client().discover("prof_err", &ident("cs101"), &ident("hw1")), None);
}

#[test]
fn oversized_listing_is_absent() {
    let listing: String = (0..400).map(|i| format!("file_{:03}.py ", i)).collect();
    assert!(listing.len() > 4096);
    let _m = mockito::mock("GET", "/prof_big/cs101/hw1/").with_body(listing).create();

    assert_eq!(make_client().discover("prof_big", &ident("cs101"), &ident("hw1")), None);

    let err = ui::run(
        &make_client(),
        &identity("prof_big"),
        &submit("cs101", "hw1"),
        Path::new("."),
        day(),
        std::io::sink(),
    )
    .unwrap_err();
    assert!(matches!(err, ClientError::Discovery));
}

#[test]
fn score_query_relays_reply_verbatim() {
    let m = mockito::mock("GET", "/prof_scores/alice/tok/cs101/")
        .with_body_from_fn(|w| {
            for piece in [&b"hw1 80%\r\n"[..], b"hw2 ", b"95%\n"] {
                w.write_all(piece)?;
                w.flush()?;
                thread::sleep(Duration::from_millis(20));
            }
            Ok(())
        })
        .create();

    let api = make_client();
    let req = api.build("prof_scores", "alice", "tok", &ident("cs101"), None, None);
    let mut out: Vec<u8> = Vec::new();
    assert_eq!(api.dispatch(&req, Path::new("."), &mut out), TransportOutcome::Completed);
    assert_eq!(out, b"hw1 80%\r\nhw2 95%\n");
    m.assert();
}

#[test]
fn submission_uploads_one_part_per_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hello')\n").unwrap();
    std::fs::write(dir.path().join("util.py"), "X = 1\n").unwrap();

    let m = mockito::mock("POST", "/prof_upload/alice/tok/cs101/hw1/")
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_body(Matcher::Regex(
            r#"(?s)name="main\.py"; filename="main\.py".*print\('hello'\)\r?\n.*name="util\.py"; filename="util\.py".*X = 1\r?\n"#
                .into(),
        ))
        .with_body("Score: 100%\n")
        .create();

    let api = make_client();
    let files = vec!["main.py".to_string(), "util.py".to_string()];
    let req = api.build("prof_upload", "alice", "tok", &ident("cs101"), Some(&ident("hw1")), Some(files.as_slice()));

    let mut out: Vec<u8> = Vec::new();
    assert_eq!(api.dispatch(&req, dir.path(), &mut out), TransportOutcome::Completed);
    assert_eq!(out, b"Score: 100%\n");
    m.assert();
}

#[test]
fn error_status_is_relayed_then_reported() {
    let _m = mockito::mock("GET", "/prof_500/alice/tok/cs101/")
        .with_status(500)
        .with_body("Casey summary error\n")
        .create();

    let api = make_client();
    let req = api.build("prof_500", "alice", "tok", &ident("cs101"), None, None);
    let mut out: Vec<u8> = Vec::new();
    assert_eq!(api.dispatch(&req, Path::new("."), &mut out), TransportOutcome::Unreachable);
    assert_eq!(out, b"Casey summary error\n");
}

#[test]
fn refused_connection_is_unreachable() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = make_config(Duration::from_secs(5));
    config.host = "127.0.0.1".into();
    config.port = port;
    let api = ApiClient::new(&config).unwrap();
    let req = api.build("prof", "alice", "tok", &ident("cs101"), None, None);

    let outcome = api.dispatch(&req, Path::new("."), std::io::sink());
    assert_eq!(outcome, TransportOutcome::Unreachable);
    assert!(outcome.into_result(&[], api.timeout()).unwrap_err().is_connectivity());
}

#[test]
fn stall_mid_reply_times_out() {
    let _m = mockito::mock("GET", "/prof_stall/alice/tok/cs101/")
        .with_body_from_fn(|w| {
            w.write_all(b"Test 1 ... ok\n")?;
            w.flush()?;
            thread::sleep(Duration::from_secs(2));
            w.write_all(b"Score: 100%\n")
        })
        .create();

    let api = ApiClient::new(&make_config(Duration::from_secs(1))).unwrap();
    let req = api.build("prof_stall", "alice", "tok", &ident("cs101"), None, None);

    let mut out: Vec<u8> = Vec::new();
    let outcome = api.dispatch(&req, Path::new("."), &mut out);
    assert_eq!(outcome, TransportOutcome::TimedOut);
    assert!(b"Test 1 ... ok\n".starts_with(&out));

    let err = outcome.into_result(&[], api.timeout()).unwrap_err();
    assert!(matches!(err, ClientError::Timeout(1)));
    assert!(err.is_connectivity());
}

#[test]
fn full_invocation_discovers_then_submits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pset1.py"), "def f():\n    return 1\n").unwrap();

    let token = token::derive("alice", "course-secret", day());
    let listing = mockito::mock("GET", "/prof_full/cs101/pset1/")
        .with_body("pset1.py\n")
        .create();
    let upload = mockito::mock("POST", format!("/prof_full/alice/{}/cs101/pset1/", token).as_str())
        .match_body(Matcher::Regex(r#"name="pset1\.py"; filename="pset1\.py""#.into()))
        .with_body("Test 1 ... ok\nScore: 100%\n")
        .create();

    let mut out: Vec<u8> = Vec::new();
    ui::run(&make_client(), &identity("prof_full"), &submit("cs101", "pset1"), dir.path(), day(), &mut out)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Test 1 ... ok\nScore: 100%\n");
    listing.assert();
    upload.assert();
}

#[test]
fn missing_upload_source_reports_every_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "").unwrap();

    let _listing = mockito::mock("GET", "/prof_missing/cs101/hw1/")
        .with_body("a.py b.py\n")
        .create();
    let upload = mockito::mock("POST", Matcher::Regex("^/prof_missing/".into()))
        .expect(0)
        .create();

    let err = ui::run(&make_client(), &identity("prof_missing"), &submit("cs101", "hw1"), dir.path(), day(), std::io::sink())
        .unwrap_err();
    assert_eq!(err.to_string(), "Unable to upload file(s): a.py b.py");
    upload.assert();
}

#[test]
fn unsafe_listing_is_refused() {
    let _listing = mockito::mock("GET", "/prof_unsafe/cs101/hw1/")
        .with_body("ok.py ../../.ssh/id_rsa\n")
        .create();

    let err = ui::run(&make_client(), &identity("prof_unsafe"), &submit("cs101", "hw1"), Path::new("."), day(), std::io::sink())
        .unwrap_err();
    assert!(matches!(err, ClientError::UnsafeFilename(ref name) if name == "../../.ssh/id_rsa"));
}
