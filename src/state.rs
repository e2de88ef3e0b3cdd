use std::fs;
use std::path::{Path, PathBuf};

use crate::types::GraphConfig;

/// Directory holding per-user graph configuration (`~/.creditgraph`).
pub fn get_config_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".creditgraph"))
}

/// Load `~/.creditgraph/config.json`, falling back to defaults when absent.
pub fn load_config() -> Result<GraphConfig, String> {
    let config_path = get_config_dir()?.join("config.json");

    if !config_path.exists() {
        log::info!(
            "No config at {}; using default graph settings",
            config_path.display()
        );
        return Ok(GraphConfig::default());
    }

    load_config_from(&config_path)
}

/// Load and validate a config file at an explicit path.
pub fn load_config_from(path: &Path) -> Result<GraphConfig, String> {
    if !path.exists() {
        return Err(format!("Config file not found at {}", path.display()));
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let mut config: GraphConfig =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    config
        .validate()
        .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;

    log::info!("Loaded graph config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"maxTelemetry": 50, "learningRate": 0.1}}"#).expect("write");

        let config = load_config_from(file.path()).expect("load");
        assert_eq!(config.max_telemetry, 50);
        assert!((config.learning_rate - 0.1).abs() < 1e-12);
        assert_eq!(config.telemetry_window, 20);
        assert!((config.decay_factor - 0.97).abs() < 1e-12);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"decayFactor": 0}}"#).expect("write");

        let err = load_config_from(file.path()).unwrap_err();
        assert!(err.contains("decayFactor"), "unexpected error: {}", err);
    }

    #[test]
    fn test_load_config_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "maxTelemetry = 5").expect("write");
        let err = load_config_from(file.path()).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_config_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.contains("not found"));
    }
}
