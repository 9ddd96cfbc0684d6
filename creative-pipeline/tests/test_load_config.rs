use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use creative_pipeline::load_config::load_config;

const REQUIRED: [(&str, &str); 7] = [
    ("AWS_ACCESS_KEY_ID", "AKIATEST"),
    ("AWS_SECRET_ACCESS_KEY", "secret"),
    ("AWS_S3_BUCKET", "creative-assets"),
    ("ADOBE_CLIENT_ID", "adobe-client"),
    ("ADOBE_CLIENT_SECRET", "adobe-secret"),
    ("BANNERBEAR_API_KEY", "bb-key"),
    ("BANNERBEAR_COLLECTION_ID", "set-1"),
];

fn set_required_env() {
    for (name, value) in REQUIRED {
        env::set_var(name, value);
    }
    env::remove_var("AWS_REGION");
    env::remove_var("AWS_S3_ENDPOINT");
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn yaml_file_overrides_defaults() {
    set_required_env();
    env::set_var("AWS_REGION", "eu-west-1");
    env::set_var("AWS_S3_ENDPOINT", "http://localhost:9000");

    let file = config_file(
        r#"
staging_dir: ./inbox
campaigns_root: ./campaigns
link_ttl_secs: 600
polling:
  intervals_secs: [1, 2]
  fallback_secs: 4
  budget_secs: 30
endpoints:
  bannerbear_base_url: http://localhost:8081
"#,
    );

    let settings = load_config(Some(file.path())).expect("Config should load");

    assert_eq!(settings.pipeline.staging_dir, PathBuf::from("./inbox"));
    assert_eq!(settings.pipeline.campaigns_root, PathBuf::from("./campaigns"));
    assert_eq!(settings.pipeline.link_ttl, Duration::from_secs(600));
    let polling = &settings.pipeline.polling;
    assert_eq!(polling.schedule.interval(0), Duration::from_secs(1));
    assert_eq!(polling.schedule.interval(5), Duration::from_secs(2));
    assert_eq!(polling.schedule.fallback(), Duration::from_secs(4));
    assert_eq!(polling.budget, Duration::from_secs(30));
    assert_eq!(settings.bannerbear.base_url, "http://localhost:8081");
    assert_eq!(settings.bannerbear.collection_id, "set-1");
    assert_eq!(settings.storage.region, "eu-west-1");
    assert_eq!(settings.storage.endpoint.as_deref(), Some("http://localhost:9000"));
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    set_required_env();
    let err = load_config(Some(std::path::Path::new("does-not-exist.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn unknown_keys_are_rejected() {
    set_required_env();
    let file = config_file("staging: ./typo\n");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn missing_secrets_fail_before_anything_else() {
    set_required_env();
    env::remove_var("BANNERBEAR_API_KEY");
    env::set_var("ADOBE_CLIENT_ID", "   ");

    let err = load_config(None).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("BANNERBEAR_API_KEY"), "{msg}");
    assert!(msg.contains("ADOBE_CLIENT_ID"), "{msg}");
}
