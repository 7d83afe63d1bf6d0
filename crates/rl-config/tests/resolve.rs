use rl_config::{
    write_canonical, ConfigChecker, ConfigError, FormatResolver, Provenance, RawInput,
    StructuralChecker,
};
use rl_types::CheckError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const NATIVE: &str = r#"{
  "log": {"level": "info"},
  "outbounds": [
    {"type": "direct", "tag": "direct"},
    {"type": "trojan", "tag": "t", "server": "t.example", "server_port": 443, "password": "p"}
  ],
  "route": {"final": "t"}
}"#;

const LINKS: &str = "\
# subscription
vless://id-1@v.example:443?security=reality&pbk=KEY&sid=01&sni=www.apple.com#V1
trojan://secret@t.example:443?sni=t.example#T1
";

const PROXY_LIST: &str = r#"
port: 7890
proxies:
  - {name: hk, type: ss, server: 1.2.3.4, port: 8388, cipher: aes-128-gcm, password: p}
  - {name: jp, type: trojan, server: jp.example, port: 443, password: p, sni: jp.example}
proxy-groups:
  - {name: PROXY, type: select, proxies: [hk, jp]}
"#;

struct RejectAll;

impl ConfigChecker for RejectAll {
    fn check(&self, _: &[u8]) -> Result<(), CheckError> {
        Err(CheckError::new("engine says no"))
    }
}

struct Counting(AtomicUsize);

impl ConfigChecker for Counting {
    fn check(&self, _: &[u8]) -> Result<(), CheckError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Exploding;

impl ConfigChecker for Exploding {
    fn check(&self, _: &[u8]) -> Result<(), CheckError> {
        panic!("checker blew up");
    }
}

fn resolve(content: &str) -> Result<rl_config::CanonicalConfig, ConfigError> {
    let checker = StructuralChecker::new();
    FormatResolver::new(&checker).resolve(&RawInput::inline(content))
}

#[test]
fn native_document_is_canonicalized() -> anyhow::Result<()> {
    let cfg = resolve(NATIVE)?;
    assert_eq!(cfg.provenance(), Provenance::Native);
    assert_eq!(cfg.outbound_tags(), vec!["direct", "t"]);
    // keys sorted: "log" < "outbounds" < "route"
    let text = cfg.as_str();
    assert!(text.find("\"log\"") < text.find("\"outbounds\""));
    assert!(text.find("\"outbounds\"") < text.find("\"route\""));
    Ok(())
}

#[test]
fn canonical_output_resolves_to_itself() -> anyhow::Result<()> {
    for input in [NATIVE, LINKS, PROXY_LIST] {
        let first = resolve(input)?;
        let second = resolve(first.as_str())?;
        assert_eq!(second.provenance(), Provenance::Native);
        assert_eq!(first.as_str(), second.as_str());
    }
    Ok(())
}

#[test]
fn empty_outbounds_is_accepted() -> anyhow::Result<()> {
    let cfg = resolve(r#"{"outbounds":[]}"#)?;
    assert_eq!(cfg.provenance(), Provenance::Native);
    assert!(cfg.outbound_tags().is_empty());
    Ok(())
}

#[test]
fn share_links_become_outbounds() -> anyhow::Result<()> {
    let cfg = resolve(LINKS)?;
    assert_eq!(cfg.provenance(), Provenance::Uri);
    assert_eq!(cfg.outbound_tags(), vec!["V1", "T1"]);
    let v1 = cfg.outbound("V1").expect("V1 present");
    assert_eq!(v1["tls"]["reality"]["public_key"], "KEY");
    Ok(())
}

#[test]
fn proxy_list_is_merged_into_template() -> anyhow::Result<()> {
    let cfg = resolve(PROXY_LIST)?;
    assert_eq!(cfg.provenance(), Provenance::Yaml);
    assert_eq!(cfg.outbound_tags(), vec!["select", "auto", "direct", "hk", "jp"]);
    assert_eq!(cfg.value()["route"]["final"], "select");
    assert_eq!(cfg.value()["inbounds"][0]["type"], "mixed");
    Ok(())
}

#[test]
fn empty_input_is_rejected() {
    let checker = StructuralChecker::new();
    let resolver = FormatResolver::new(&checker);
    assert!(matches!(resolver.resolve(&RawInput::from_parts("", "")), Err(ConfigError::EmptyInput)));
    assert!(matches!(resolver.resolve_content(""), Err(ConfigError::EmptyInput)));
}

#[test]
fn empty_proxy_list_is_no_outbounds() {
    let err = resolve("proxies: []\n").unwrap_err();
    assert!(matches!(err, ConfigError::NoOutbounds));
    assert_eq!(err.to_string(), "no outbounds found");
}

#[test]
fn unrecognized_content_lists_three_attempts() {
    let err = resolve("hello world").unwrap_err();
    match err {
        ConfigError::Unsupported { attempts } => {
            let order: Vec<Provenance> = attempts.iter().map(|a| a.provenance).collect();
            assert_eq!(order, Provenance::ORDER.to_vec());
            assert!(attempts.iter().all(|a| !a.reason.is_empty()));
        }
        other => panic!("expected unsupported, got {other:?}"),
    }
}

#[test]
fn native_validation_failure_is_terminal() {
    let err = resolve(r#"{"outbounds":[{"type":"trojan","tag":"t"}]}"#).unwrap_err();
    match err {
        ConfigError::Validation { provenance, source } => {
            assert_eq!(provenance, Provenance::Native);
            assert!(source.0.contains("missing server"), "{source}");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn non_object_json_is_an_invalid_native_document() {
    for content in ["[1,2]", "42", "\"text\"", "true"] {
        match resolve(content).unwrap_err() {
            ConfigError::Validation { provenance, source } => {
                assert_eq!(provenance, Provenance::Native, "{content}");
                assert!(source.0.contains("root must be an object"), "{source}");
            }
            other => panic!("{content}: expected validation failure, got {other:?}"),
        }
    }
}

#[test]
fn checker_rejection_carries_branch_provenance() {
    let resolver = FormatResolver::new(&RejectAll);
    let err = resolver.resolve_content(LINKS).unwrap_err();
    assert_eq!(err.to_string(), "[uri] invalid config: engine says no");

    let err = resolver.resolve_content(PROXY_LIST).unwrap_err();
    assert_eq!(err.provenance(), Some(Provenance::Yaml));
}

#[test]
fn checker_runs_once_per_resolution() -> anyhow::Result<()> {
    let checker = Counting(AtomicUsize::new(0));
    FormatResolver::new(&checker).resolve_content(PROXY_LIST)?;
    assert_eq!(checker.0.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn panicking_checker_becomes_fault() {
    let err = FormatResolver::new(&Exploding)
        .resolve(&RawInput::inline(NATIVE))
        .unwrap_err();
    match err {
        ConfigError::Fault(fault) => {
            assert_eq!(fault.operation(), "resolve");
            assert_eq!(fault.message(), "checker blew up");
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[test]
fn reads_input_from_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sub.txt");
    std::fs::write(&path, LINKS)?;
    let checker = StructuralChecker::new();
    let cfg = FormatResolver::new(&checker).resolve(&RawInput::from_parts("", path.to_string_lossy()))?;
    assert_eq!(cfg.provenance(), Provenance::Uri);
    Ok(())
}

#[test]
fn concurrent_resolution_is_deterministic() -> anyhow::Result<()> {
    let expected = resolve(PROXY_LIST)?.into_string();
    let results: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| resolve(PROXY_LIST).map(|c| c.into_string())))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread").expect("resolve"))
            .collect()
    });
    assert!(results.iter().all(|r| *r == expected));
    Ok(())
}

#[test]
fn write_canonical_replaces_target() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("config.json");
    std::fs::write(&target, "stale")?;

    let cfg = write_canonical(&RawInput::inline(LINKS), &StructuralChecker::new(), &target)?;

    assert_eq!(std::fs::read_to_string(&target)?, cfg.as_str());
    assert!(!dir.path().join("config.json.tmp").exists());
    Ok(())
}

#[test]
fn write_canonical_leaves_target_on_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("config.json");
    std::fs::write(&target, "previous")?;

    let result = write_canonical(&RawInput::inline("hello world"), &StructuralChecker::new(), &target);
    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&target)?, "previous");
    Ok(())
}
