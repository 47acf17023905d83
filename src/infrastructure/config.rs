use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const POLICIES_JSON: &str = "policies.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub policies: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayPlan"
            }),
        ),
        (
            POLICIES_JSON,
            serde_json::json!({
                "schema": 1,
                "pacing": {
                    "minChunkMinutes": 30,
                    "chunkCeilingMinutes": 120,
                    "breakMinutes": 5,
                    "bufferDays": 1
                },
                "revision": {
                    "blockMinutes": 60
                }
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            InfraError::InvalidInput(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(InfraError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        policies: read_config(&config_dir.join(POLICIES_JSON))?,
    })
}

pub fn read_policies(config_dir: &Path) -> Result<serde_json::Value, InfraError> {
    read_config(&config_dir.join(POLICIES_JSON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "dayplan-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_default_configs_writes_missing_files() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let bundle = load_configs(&dir.path).expect("load configs");
        assert_eq!(
            bundle.policies.pointer("/pacing/minChunkMinutes"),
            Some(&serde_json::json!(30))
        );
        assert_eq!(
            bundle.policies.pointer("/pacing/chunkCeilingMinutes"),
            Some(&serde_json::json!(120))
        );
    }

    #[test]
    fn ensure_default_configs_keeps_existing_files() {
        let dir = TempConfigDir::new();
        let custom = serde_json::json!({"schema": 1, "appName": "Custom"});
        fs::write(
            dir.path.join(APP_JSON),
            serde_json::to_string_pretty(&custom).expect("serialize"),
        )
        .expect("write custom app.json");

        ensure_default_configs(&dir.path).expect("ensure defaults");
        let bundle = load_configs(&dir.path).expect("load configs");
        assert_eq!(
            bundle.app.get("appName"),
            Some(&serde_json::json!("Custom"))
        );
    }

    #[test]
    fn read_config_rejects_unsupported_schema() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(POLICIES_JSON), r#"{"schema": 9}"#)
            .expect("write bad policies");
        fs::write(dir.path.join(APP_JSON), r#"{"schema": 1}"#).expect("write app");

        assert!(load_configs(&dir.path).is_err());
    }
}
