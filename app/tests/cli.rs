//! Offline CLI contract: parse and check without an engine binary.

use assert_cmd::Command;
use serde_json::Value;
use std::fs;

const PROXY_LIST: &str = r#"
proxies:
  - {name: hk, type: ss, server: 1.2.3.4, port: 8388, cipher: aes-128-gcm, password: p}
"#;

fn relation() -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("relation")?;
    cmd.env_remove("RL_LOG_LEVEL").env_remove("RL_LOG_FORMAT");
    Ok(cmd)
}

#[test]
fn parse_prints_canonical_config() -> anyhow::Result<()> {
    let out = relation()?
        .args(["parse", "--offline", "--content", "ss://YWVzLTEyOC1nY206cA@1.2.3.4:8388#hk"])
        .output()?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let doc: Value = serde_json::from_slice(&out.stdout)?;
    let tags: Vec<&str> = doc["outbounds"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["tag"].as_str())
        .collect();
    assert!(tags.contains(&"hk"));
    Ok(())
}

#[test]
fn parse_writes_output_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("clash.yaml");
    let output = dir.path().join("out.json");
    fs::write(&input, PROXY_LIST)?;

    relation()?
        .args(["parse", "--offline", "-f"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let doc: Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert!(doc["outbounds"].as_array().unwrap().len() >= 2);
    Ok(())
}

#[test]
fn parse_without_input_fails() -> anyhow::Result<()> {
    let out = relation()?.args(["parse", "--offline"]).output()?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("empty config"));
    Ok(())
}

#[test]
fn check_reports_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.yaml");
    let bad = dir.path().join("bad.txt");
    fs::write(&good, PROXY_LIST)?;
    fs::write(&bad, "this is not a config")?;

    let out = relation()?
        .args(["check", "--offline", "--format", "json", "-f"])
        .arg(&good)
        .output()?;
    assert_eq!(out.status.code(), Some(0));
    let report: Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(report["ok"], true);
    assert_eq!(report["provenance"], "yaml");

    let out = relation()?
        .args(["check", "--offline", "--format", "json", "-f"])
        .arg(&bad)
        .output()?;
    assert_eq!(out.status.code(), Some(2));
    let report: Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(report["ok"], false);
    assert!(report["error"].as_str().unwrap().starts_with("unsupported config format"));
    Ok(())
}
