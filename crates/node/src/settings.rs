//! Layered Settings
//!
//! Built-in defaults, then a TOML file, then `PITLINK__` environment
//! variables (`PITLINK__CAR__UPLINK__GROUND_URL=http://ground:5000`).

use acquisition::AcquisitionConfig;
use config::{Config, ConfigError, Environment, File};
use hub::HubConfig;
use role::RoleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uplink::UplinkConfig;

const DEFAULT_FILE: &str = "pitlink";
const ENV_PREFIX: &str = "PITLINK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub role: RoleConfig,
    pub car: CarSettings,
    pub ground: GroundSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// One JSON object per line instead of text
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Car node: acquisition feeding the uplink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarSettings {
    pub acquisition: AcquisitionConfig,
    pub uplink: UplinkConfig,
}

/// Ground node: hub behind the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSettings {
    pub listen: String,
    pub hub: HubConfig,
}

impl Default for GroundSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            hub: HubConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise
    /// `pitlink.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn no_env() -> Environment {
        environment().source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.toml");
        fs::write(&path, "").unwrap();

        let settings = Settings::load_with(Some(&path), no_env()).unwrap();
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.ground.listen, "0.0.0.0:5000");
        assert_eq!(settings.ground.hub.obd_history, 100);
        assert_eq!(settings.ground.hub.gps_history, 1000);
        assert_eq!(settings.car.uplink.ground_url, "http://localhost:5000");
        assert_eq!(settings.car.acquisition.obd_interval_ms, 1000);
        assert_eq!(settings.role.production_file, Path::new("/boot/pi_role"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pitlink.toml");
        fs::write(
            &path,
            r#"
[log]
json = true

[car.uplink]
ground_url = "http://192.168.4.1:5000"
queue_capacity = 50

[ground.hub]
gps_history = 250
"#,
        )
        .unwrap();

        let settings = Settings::load_with(Some(&path), no_env()).unwrap();
        assert!(settings.log.json);
        assert_eq!(settings.car.uplink.ground_url, "http://192.168.4.1:5000");
        assert_eq!(settings.car.uplink.queue_capacity, 50);
        assert_eq!(settings.car.uplink.send_timeout_ms, 2000);
        assert_eq!(settings.ground.hub.gps_history, 250);
        assert_eq!(settings.ground.hub.obd_history, 100);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pitlink.toml");
        fs::write(&path, "[ground]\nlisten = \"127.0.0.1:6000\"\n").unwrap();

        let vars = HashMap::from([
            ("PITLINK__GROUND__LISTEN".to_string(), "127.0.0.1:7000".to_string()),
            ("PITLINK__CAR__ACQUISITION__GPS_INTERVAL_MS".to_string(), "200".to_string()),
        ]);
        let env = environment().source(Some(vars));

        let settings = Settings::load_with(Some(&path), env).unwrap();
        assert_eq!(settings.ground.listen, "127.0.0.1:7000");
        assert_eq!(settings.car.acquisition.gps_interval_ms, 200);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Settings::load_with(Some(&path), no_env()).is_err());
    }
}
