use std::collections::HashMap;
use std::io::Write;

use stagehand::errors::DeployError;
use stagehand::storage::settings::{Settings, CONFIG_ENV_VAR};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn settings_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn required_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("PLATFORM_API_TOKEN", "platform-token"),
        ("APP_ID", "storefront-staging"),
        ("SOURCE_BLOB_URL", "https://downloads.example/slug.tgz"),
    ]
}

fn config_error(result: Result<Settings, DeployError>) -> String {
    match result {
        Err(DeployError::ConfigError(msg)) => msg,
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_load_from_env() {
    let mut env = required_env();
    env.push(("PR_URL", "https://github.com/acme/storefront/pull/42"));
    env.push(("LOG_LEVEL", "debug"));
    env.push(("LOG_JSON", "true"));

    let settings = tokio_test::block_on(Settings::load(&HashMap::new(), env_from(&env))).unwrap();

    assert_eq!(settings.app_id.as_deref(), Some("storefront-staging"));
    assert_eq!(settings.pr_url.as_deref(), Some("https://github.com/acme/storefront/pull/42"));
    assert_eq!(settings.log_level, "debug");
    assert!(settings.log_json);
    assert_eq!(settings.max_consecutive_failures, 15);
    assert_eq!(settings.poll_interval_secs, 10);
    assert_eq!(settings.deploy_timeout_secs, 300);
}

#[test]
fn test_precedence_file_env_cli() {
    let file = settings_file(
        r#"{
            "platform_api_token": "from-file",
            "app_id": "from-file",
            "source_blob_url": "https://downloads.example/file.tgz",
            "deploy_timeout_secs": 600,
            "poll_interval_secs": 5,
            "status_context": "file-context"
        }"#,
    );
    let path = file.path().to_string_lossy().to_string();

    let env = env_from(&[
        (CONFIG_ENV_VAR, path.as_str()),
        ("APP_ID", "from-env"),
        ("DEPLOY_TIMEOUT_SECS", "120"),
    ]);
    let cli = args(&[("deploy-timeout-secs", "90")]);

    let settings = tokio_test::block_on(Settings::load(&cli, env)).unwrap();

    assert_eq!(settings.platform_api_token.as_deref(), Some("from-file"));
    assert_eq!(settings.app_id.as_deref(), Some("from-env"));
    assert_eq!(settings.poll_interval_secs, 5);
    assert_eq!(settings.deploy_timeout_secs, 90);
    assert_eq!(settings.status_context, "file-context");
}

#[test]
fn test_config_flag_overrides_config_env() {
    let file = settings_file(
        r#"{"platform_api_token": "t", "app_id": "from-flag", "source_blob_url": "https://d.example/s.tgz"}"#,
    );
    let path = file.path().to_string_lossy().to_string();
    let cli = args(&[("config", path.as_str())]);
    let env = env_from(&[(CONFIG_ENV_VAR, "/nonexistent/stagehand.json")]);

    let settings = tokio_test::block_on(Settings::load(&cli, env)).unwrap();
    assert_eq!(settings.app_id.as_deref(), Some("from-flag"));
}

#[test]
fn test_missing_settings_file() {
    let cli = args(&[("config", "/nonexistent/stagehand.json")]);
    let result = tokio_test::block_on(Settings::load(&cli, env_from(&required_env())));
    assert!(matches!(result, Err(DeployError::IoError(_))));
}

#[test]
fn test_missing_token() {
    let env = env_from(&[("APP_ID", "a"), ("SOURCE_BLOB_URL", "https://d.example/s.tgz")]);
    let msg = config_error(tokio_test::block_on(Settings::load(&HashMap::new(), env)));
    assert!(msg.contains("PLATFORM_API_TOKEN"));
}

#[test]
fn test_missing_app_id() {
    let env = env_from(&[("PLATFORM_API_TOKEN", "t"), ("SOURCE_BLOB_URL", "https://d.example/s.tgz")]);
    let msg = config_error(tokio_test::block_on(Settings::load(&HashMap::new(), env)));
    assert!(msg.contains("APP_ID"));
}

#[test]
fn test_source_is_required_and_exclusive() {
    let env = env_from(&[("PLATFORM_API_TOKEN", "t"), ("APP_ID", "a")]);
    let msg = config_error(tokio_test::block_on(Settings::load(&HashMap::new(), env)));
    assert!(msg.contains("one of"));

    let mut env = required_env();
    env.push(("ARTIFACT_PATH", "dist/slug.tgz"));
    let msg = config_error(tokio_test::block_on(Settings::load(&HashMap::new(), env_from(&env))));
    assert!(msg.contains("mutually exclusive"));
}

#[test]
fn test_zero_ceiling_is_rejected() {
    let cli = args(&[("max-consecutive-failures", "0")]);
    let msg = config_error(tokio_test::block_on(Settings::load(&cli, env_from(&required_env()))));
    assert!(msg.contains("max_consecutive_failures"));
}

#[test]
fn test_unknown_cli_setting() {
    let cli = args(&[("poll-intervall-secs", "5")]);
    let msg = config_error(tokio_test::block_on(Settings::load(&cli, env_from(&required_env()))));
    assert!(msg.contains("poll_intervall_secs"));
}

#[test]
fn test_invalid_log_level() {
    let mut settings = Settings::default();
    assert!(matches!(
        settings.set("log_level", "chatty"),
        Err(DeployError::ConfigError(_))
    ));
    assert!(settings.set("log_level", "WARN").is_ok());
    assert_eq!(settings.log_level, "warn");
}

#[test]
fn test_invalid_log_level_in_settings_file() {
    let file = settings_file(r#"{"log_level": "chatty"}"#);
    let path = file.path().to_string_lossy().to_string();
    let cli = args(&[("config", path.as_str())]);

    let msg = config_error(tokio_test::block_on(Settings::load(&cli, env_from(&required_env()))));
    assert!(msg.contains("chatty"));
}
