#![cfg(unix)]

use rl_config::{ConfigChecker, RawInput};
use rl_core::{ProcessEngine, ProcessSettings, SessionController, SessionState};
use rl_types::{ConfigError, SessionError};
use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Stand-in for sing-box:
/// - `check -c FILE` fails when FILE mentions "reject-me";
/// - `run -c FILE -D DIR` records GOMEMLIMIT in DIR, exits at once when FILE
///   mentions "exit-early", otherwise stays up.
const FAKE_ENGINE: &str = r#"#!/bin/sh
case "$1" in
  check)
    if grep -q reject-me "$3"; then
      echo "outbound[0]: rejected by fake engine" >&2
      exit 1
    fi
    exit 0
    ;;
  run)
    printf '%s' "$GOMEMLIMIT" > "$5/gomemlimit"
    if grep -q exit-early "$3"; then
      exit 3
    fi
    exec sleep 30
    ;;
esac
exit 2
"#;

/// Written once per test binary so no test forks while the script is still
/// open for writing.
fn fake_binary() -> &'static Path {
    static BIN: OnceLock<PathBuf> = OnceLock::new();
    BIN.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("relation-fake-engine-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create fake engine dir");
        let path = dir.join("sing-box");
        fs::write(&path, FAKE_ENGINE).expect("write fake engine");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake engine");
        path
    })
}

fn engine(work: &Path) -> ProcessEngine {
    ProcessEngine::new(ProcessSettings {
        binary: fake_binary().to_path_buf(),
        working_dir: work.to_path_buf(),
        temp_dir: work.to_path_buf(),
        ..Default::default()
    })
}

fn native(tag: &str) -> String {
    format!(r#"{{"outbounds":[{{"type":"direct","tag":"{tag}"}}]}}"#)
}

#[test]
fn check_accepts_and_rejects() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine(dir.path());

    engine.check(native("ok").as_bytes())?;
    let err = engine.check(native("reject-me").as_bytes()).unwrap_err();
    assert_eq!(err.0, "outbound[0]: rejected by fake engine");
    Ok(())
}

#[test]
fn engine_rejection_is_a_validation_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ctl = SessionController::new(engine(dir.path()));

    let err = ctl.start(&RawInput::inline(native("reject-me")), false).unwrap_err();
    match err {
        SessionError::Config(ConfigError::Validation { source, .. }) => {
            assert!(source.0.contains("rejected by fake engine"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(ctl.state(), SessionState::Stopped);
    Ok(())
}

#[test]
fn runs_and_stops_child_process() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ctl = SessionController::new(engine(dir.path()));

    ctl.start(&RawInput::inline(native("d")), true)?;
    assert!(ctl.is_running());
    assert_eq!(fs::read_to_string(dir.path().join("gomemlimit"))?, "45MiB");

    ctl.stop()?;
    assert!(!ctl.is_running());
    let leftovers: Vec<_> = fs::read_dir(dir.path())?
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("relation-run-"))
        .collect();
    assert!(leftovers.is_empty(), "config file not removed");
    Ok(())
}

#[test]
fn memory_limit_off_leaves_env_unset() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ctl = SessionController::new(engine(dir.path()));

    ctl.start(&RawInput::inline(native("d")), false)?;
    assert_eq!(fs::read_to_string(dir.path().join("gomemlimit"))?, "");
    ctl.stop()?;
    Ok(())
}

#[test]
fn early_exit_fails_start() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ctl = SessionController::new(engine(dir.path()));

    let err = ctl.start(&RawInput::inline(native("exit-early")), false).unwrap_err();
    assert!(matches!(err, SessionError::Start(_)), "{err}");
    assert!(err.to_string().contains("exited during startup"), "{err}");
    assert_eq!(ctl.state(), SessionState::Stopped);
    Ok(())
}

#[test]
fn url_test_probes_group_members() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let doc = format!(
        r#"{{"outbounds":[
            {{"type":"selector","tag":"select","outbounds":["up"]}},
            {{"type":"trojan","tag":"up","server":"127.0.0.1","server_port":{port},"password":"p"}}
        ]}}"#
    );

    let ctl = SessionController::new(engine(dir.path())).with_settle_delay(Duration::ZERO);
    ctl.start(&RawInput::inline(doc), false)?;
    let probes = ctl.url_test("select")?;
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].tag, "up");
    assert!(probes[0].delay.is_some());

    assert!(matches!(ctl.url_test("nope"), Err(SessionError::UrlTest(_))));
    ctl.stop()?;
    Ok(())
}
