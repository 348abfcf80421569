#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use campuswire_server::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "0.0.0.0:8808"
  max_connectionz: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "ERROR");
}

#[test]
fn ok_minimal_config_gets_defaults() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:8808");
    assert_eq!(cfg.server.max_connections, 64);
    assert_eq!(cfg.server.shutdown_grace_ms, 5000);
}

#[test]
fn wrong_version_is_rejected() {
    let bad = r#"
version: 2
"#;
    config::load_from_str(bad).expect_err("must fail");
}

#[test]
fn out_of_range_values_are_rejected() {
    let bad = r#"
version: 1
server:
  max_connections: 0
"#;
    config::load_from_str(bad).expect_err("must fail");

    let bad = r#"
version: 1
server:
  idle_timeout_ms: 5
"#;
    config::load_from_str(bad).expect_err("must fail");

    let bad = r#"
version: 1
server:
  max_frame_bytes: 16
"#;
    config::load_from_str(bad).expect_err("must fail");
}

#[test]
fn idle_timeout_zero_disables_the_deadline() {
    let ok = r#"
version: 1
server:
  idle_timeout_ms: 0
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.server.idle_timeout_ms, 0);
}
