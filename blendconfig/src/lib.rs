//! # Blend Configuration Module
//!
//! This module provides configuration management for Blend, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//!
//! Unlike a process-wide singleton, a [`Config`] is owned by the caller and
//! passed explicitly (usually inside an `Arc`) to whatever needs it.
//!
//! ## Usage
//!
//! ```no_run
//! use blendconfig::Config;
//!
//! let config = Config::load_config("")?;
//!
//! // Access configuration values
//! let level = config.get_log_min_level()?;
//!
//! // Update configuration values (persisted to config.yaml)
//! config.set_log_min_level("debug".to_string())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("blend.yaml");

const ENV_CONFIG_DIR: &str = "BLEND_CONFIG";
const ENV_PREFIX: &str = "BLEND_CONFIG__";
const CONFIG_DIR_NAME: &str = ".blend";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> usize {
            self.get_usize($path, $default)
        }

        pub fn $setter(&self, size: usize) -> Result<()> {
            let n = Number::from(size as u64);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            self.get_bool($path, $default)
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for Blend
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// # Examples
///
/// ```no_run
/// use blendconfig::Config;
///
/// let config = Config::load_config("")?;
/// println!("Log level: {}", config.get_log_min_level()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        CONFIG_DIR_NAME.to_string()
    }

    /// Checks that an existing config directory can be read
    ///
    /// A missing directory is accepted: the embedded defaults apply and
    /// nothing is created until something is saved.
    fn check_readable(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }
        fs::read_dir(path)?;
        Ok(())
    }

    /// Creates the config directory if needed and checks it is writable
    fn prepare_for_write(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `BLEND_CONFIG` environment variable
    /// 3. `.blend` in the current directory
    /// 4. `.blend` in the user's home directory
    ///
    /// Only read access is checked. The directory is not created here.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::check_readable(Path::new(&dir_path))
            .map_err(|e| anyhow!("Invalid configuration directory {}: {}", dir_path, e))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    ///
    /// Nothing is written back to disk here; only the setters persist.
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to use defaults
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join(CONFIG_FILE_NAME);
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path, "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file=%path, "Config file not found, using default embedded config");
            }
        }

        let mut config_value = Self::lower_keys_value(config_value);
        Self::apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Returns the directory the configuration was loaded from
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// Creates the config directory on first use.
    pub fn save(&self) -> Result<()> {
        Self::prepare_for_write(Path::new(&self.config_dir)).map_err(|e| {
            anyhow!("Cannot write configuration directory {}: {}", self.config_dir, e)
        })?;
        let yaml = {
            let data = self.lock()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["overlap", "batch_size"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock()?;
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Reads a non-empty string, accepting numbers written without quotes
    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Reads an unsigned integer, falling back to `default` when absent or mistyped
    pub fn get_usize(&self, path: &[&str], default: usize) -> usize {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().map(|v| v as usize).unwrap_or(default),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Invalid number '{}' at {}, using default {}",
                    s,
                    path.join("."),
                    default
                );
                default
            }),
            _ => default,
        }
    }

    /// Reads a boolean, falling back to `default` when absent or mistyped
    pub fn get_bool(&self, path: &[&str], default: bool) -> bool {
        match self.get_value(path) {
            Ok(Value::Bool(b)) => b,
            _ => default,
        }
    }

    fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!("Ignoring env override {}: {}", key, e);
                }
            }
        }
    }

    /// Booleans and plain integers are typed, anything else stays a string
    /// so that secrets such as `12e45` or `0x1f` are kept verbatim.
    fn convert_env_value(value: &str) -> Value {
        match serde_yaml::from_str::<Value>(value) {
            Ok(Value::Bool(b)) => Value::Bool(b),
            Ok(Value::Number(n)) if n.to_string() == value.trim() => Value::Number(n),
            _ => Value::String(value.to_string()),
        }
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Minimum log level, `info` when unset
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }

    impl_usize_config!(
        get_overlap_batch_size,
        set_overlap_batch_size,
        &["overlap", "batch_size"],
        25
    );

    impl_bool_config!(
        get_overlap_validate_users,
        set_overlap_validate_users,
        &["overlap", "validate_users"],
        true
    );
}

/// Merges external YAML configuration into default configuration
///
/// This function recursively merges two YAML value trees:
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);

        assert_eq!(config.get_log_min_level().unwrap(), "info");
        assert_eq!(config.get_overlap_batch_size(), 25);
        assert!(config.get_overlap_validate_users());
        assert_eq!(
            config.get_string(&["sources", "spotify", "api_base"]).as_deref(),
            Some("https://api.spotify.com/v1")
        );
        // Loading alone does not create config.yaml
        assert!(!dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_loading_does_not_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nested").join(".blend");
        let config = Config::load_config(missing.to_str().unwrap()).unwrap();

        assert_eq!(config.get_overlap_batch_size(), 25);
        assert!(!missing.exists());

        config.set_overlap_batch_size(10).unwrap();
        assert!(missing.join(CONFIG_FILE_NAME).exists());
        assert!(!missing.join(".write_test").exists());
    }

    #[test]
    fn test_config_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        fs::write(&file, "x").unwrap();
        assert!(Config::load_config(file.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_external_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "Overlap:\n  Batch_Size: 10\naccounts:\n  spotify:\n    client_id: abc\n",
        )
        .unwrap();

        let config = load_in(&dir);
        assert_eq!(config.get_overlap_batch_size(), 10);
        assert!(config.get_overlap_validate_users());
        assert_eq!(
            config.get_string(&["accounts", "spotify", "client_id"]).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_set_value_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config.set_overlap_validate_users(false).unwrap();
        assert!(!config.get_overlap_validate_users());

        let reloaded = load_in(&dir);
        assert!(!reloaded.get_overlap_validate_users());
    }

    #[test]
    fn test_env_overrides() {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let vars = vec![
            (
                "BLEND_CONFIG__ACCOUNTS__SPOTIFY__CLIENT_SECRET".to_string(),
                "s3cr3t".to_string(),
            ),
            ("BLEND_CONFIG__OVERLAP__BATCH_SIZE".to_string(), "5".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        Config::apply_env_overrides(&mut value, vars.into_iter());

        assert_eq!(
            Config::get_value_internal(&value, &["accounts", "spotify", "client_secret"]).unwrap(),
            Value::String("s3cr3t".to_string())
        );
        assert_eq!(
            Config::get_value_internal(&value, &["overlap", "batch_size"]).unwrap(),
            Value::Number(Number::from(5))
        );
    }

    #[test]
    fn test_env_values_keep_secrets_verbatim() {
        assert_eq!(Config::convert_env_value("true"), Value::Bool(true));
        assert_eq!(Config::convert_env_value("30"), Value::from(30));
        assert_eq!(Config::convert_env_value("12e45"), Value::from("12e45"));
        assert_eq!(Config::convert_env_value("0x1f"), Value::from("0x1f"));
        assert_eq!(Config::convert_env_value("007"), Value::from("007"));
    }

    #[test]
    fn test_get_string_accepts_numbers_and_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config
            .set_value(&["accounts", "spotify", "client_id"], Value::Number(Number::from(42)))
            .unwrap();
        assert_eq!(
            config.get_string(&["accounts", "spotify", "client_id"]).as_deref(),
            Some("42")
        );
        assert_eq!(config.get_string(&["accounts", "spotify", "client_secret"]), None);
        assert_eq!(config.get_string(&["does", "not", "exist"]), None);
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut base: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let ext: Value = serde_yaml::from_str("a:\n  c: 3\n  d: 4\n").unwrap();
        merge_yaml(&mut base, &ext);
        assert_eq!(Config::get_value_internal(&base, &["a", "b"]).unwrap(), Value::from(1));
        assert_eq!(Config::get_value_internal(&base, &["a", "c"]).unwrap(), Value::from(3));
        assert_eq!(Config::get_value_internal(&base, &["a", "d"]).unwrap(), Value::from(4));
    }
}
