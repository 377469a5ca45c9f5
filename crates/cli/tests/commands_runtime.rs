use std::env;
use std::sync::{Mutex, OnceLock};

use joblab_cli::commands::{ask, config, doctor, migrate};
use serde_json::Value;

const VALID_ENV: [(&str, &str); 4] = [
    ("JOBLAB_DATABASE_URL", "sqlite::memory:"),
    ("JOBLAB_DATASTORE_URL", "http://127.0.0.1:9"),
    ("JOBLAB_DATASTORE_SERVICE_KEY", "sb-service-secret"),
    ("JOBLAB_LLM_API_KEY", "sk-ant-secret-value"),
];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_redacts_secrets_and_reports_env_sources() {
    with_env(&VALID_ENV, || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("- llm.api_key = sk-*** (source: env (JOBLAB_LLM_API_KEY))"));
        assert!(message.contains("- datastore.service_key = sb-***"));
        assert!(message.contains("- embeddings.url = <unset> (source: default)"));
        assert!(!message.contains("secret-value"));
        assert!(!message.contains("service-secret"));
    });
}

#[test]
fn doctor_passes_with_valid_env() {
    with_env(&VALID_ENV, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected doctor to pass");

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        let statuses: Vec<(&str, &str)> = report["checks"]
            .as_array()
            .map(|checks| {
                checks
                    .iter()
                    .map(|check| {
                        (
                            check["name"].as_str().unwrap_or_default(),
                            check["status"].as_str().unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(
            statuses,
            [
                ("config_validation", "pass"),
                ("datastore_settings", "pass"),
                ("embeddings_settings", "skipped"),
                ("cv_store_connectivity", "pass"),
            ]
        );
    });
}

#[test]
fn doctor_reports_config_failure() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] cv_store_connectivity:"));
    });
}

#[test]
fn ask_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = ask::run("How many jobs are there?", None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn ask_reports_unreachable_completion_service() {
    let mut vars = VALID_ENV.to_vec();
    vars.push(("JOBLAB_LLM_BASE_URL", "http://127.0.0.1:9"));
    with_env(&vars, || {
        let result = ask::run("How many remote jobs are in Germany?", Some("conv-cli"));
        assert_eq!(result.exit_code, 3, "expected runtime failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "completion");
    });
}

#[test]
fn ask_rejects_blank_prompt() {
    let result = ask::run("   ", None);
    assert_eq!(result.exit_code, 3);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "JOBLAB_DATABASE_URL",
        "JOBLAB_DATABASE_MAX_CONNECTIONS",
        "JOBLAB_DATABASE_TIMEOUT_SECS",
        "JOBLAB_DATASTORE_URL",
        "JOBLAB_DATASTORE_SERVICE_KEY",
        "JOBLAB_LLM_API_KEY",
        "JOBLAB_LLM_BASE_URL",
        "JOBLAB_LLM_MODEL",
        "JOBLAB_LLM_TIMEOUT_SECS",
        "JOBLAB_EMBEDDINGS_URL",
        "JOBLAB_EMBEDDINGS_API_KEY",
        "JOBLAB_SERVER_BIND_ADDRESS",
        "JOBLAB_SERVER_PORT",
        "JOBLAB_LOGGING_LEVEL",
        "JOBLAB_LOGGING_FORMAT",
        "JOBLAB_LOG_LEVEL",
        "JOBLAB_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
