mod common;

use common::{controller, NATIVE};
use relation::flat;
use std::sync::atomic::Ordering;

#[test]
fn success_is_empty_string() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    std::fs::write(&path, NATIVE)?;
    let path = path.to_string_lossy().into_owned();
    let (ctl, shared) = controller();

    assert_eq!(flat::setup(&ctl, "", "/var/lib/relation", "", 0, false), flat::SUCCESS);
    assert_eq!(flat::start(&ctl, &path, false), "");
    assert_eq!(flat::url_test(&ctl, "direct"), "");
    assert_eq!(flat::restart(&ctl, &path, true), "");
    assert_eq!(flat::stop(&ctl), "");
    assert_eq!(shared.live.load(Ordering::SeqCst), 0);
    assert_eq!(shared.setups.lock()[0].working_path, "/var/lib/relation");
    Ok(())
}

#[test]
fn failures_return_error_text() {
    let (ctl, _) = controller();
    assert_eq!(flat::stop(&ctl), "engine is not running");
    assert_eq!(flat::restart(&ctl, "/nowhere.json", false), "instance not found");
    assert_eq!(flat::start(&ctl, "", false), "empty config");
    assert!(flat::start(&ctl, "/definitely/missing.json", false).starts_with("failed to read config from"));
    assert_eq!(
        flat::setup(&ctl, "", "/nonexistent", "", 0, false),
        "engine setup failed: working path does not exist"
    );
}

#[test]
fn parse_returns_document_or_error_text() {
    let (ctl, _) = controller();
    let doc = flat::parse(&ctl, NATIVE, "");
    assert!(doc.starts_with('{'));
    assert!(doc.contains("\"direct\""));

    assert_eq!(flat::parse(&ctl, "", ""), "empty config");
    assert_eq!(flat::parse(&ctl, "proxies: []", ""), "no outbounds found");
}
