//! Configuration loader for jobforge
//!
//! [`ConfigLoader`] loads configuration from multiple sources with proper
//! precedence.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "JOBFORGE_CONFIG_DIR";

/// Environment variable for a single configuration file
const CONFIG_FILE_ENV: &str = "JOBFORGE_CONFIG_FILE";

const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "JOBFORGE";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Loads layered configuration
///
/// Sources in order of priority:
/// 1. `default.toml` - Base default configuration (required)
/// 2. `{environment}.toml` - Environment-specific configuration (optional)
/// 3. `local.toml` - Local overrides (optional)
/// 4. `JOBFORGE_*` environment variables (highest priority)
///
/// When a single configuration file is set, it replaces the three file
/// layers; environment variables still apply on top.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// Single configuration file; skips layered loading when set
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a loader from the process environment
    ///
    /// Reads `JOBFORGE_CONFIG_DIR`, `JOBFORGE_CONFIG_FILE` and
    /// `JOBFORGE_APP_ENV`.
    ///
    /// # Errors
    ///
    /// Returns an error if both `JOBFORGE_CONFIG_DIR` and `JOBFORGE_CONFIG_FILE`
    /// are set, as they are mutually exclusive.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_dir.is_some() && config_file.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "JOBFORGE_CONFIG_DIR and JOBFORGE_CONFIG_FILE cannot both be set. \
                 Use JOBFORGE_CONFIG_DIR for layered configuration or \
                 JOBFORGE_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir: config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Load from one explicit file instead of the layered directory.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Override the environment read from `JOBFORGE_APP_ENV`.
    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load and validate configuration from all sources
    ///
    /// # Errors
    ///
    /// - `default.toml` (or the single file) is not found
    /// - Configuration parsing fails
    /// - Configuration validation fails
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = match self.config_file {
            Some(ref config_file) => Self::add_file_source(builder, config_file, true)?,
            None => self.build_layered_config(builder)?,
        };

        // JOBFORGE_ENGINE__WORKERS_PER_TYPE -> engine.workers_per_type
        Self::add_env_source(builder)
            .build()
            .map_err(ConfigError::from)
    }

    fn build_layered_config(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let default_path = self.config_dir.join("default.toml");
        let builder = Self::add_file_source(builder, &default_path, true)?;

        let env_path = self
            .config_dir
            .join(format!("{}.toml", self.environment.as_str()));
        let builder = Self::add_file_source(builder, &env_path, false)?;

        let local_path = self.config_dir.join("local.toml");
        Self::add_file_source(builder, &local_path, false)
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if required && !path.exists() {
            return Err(ConfigError::file_not_found(format!(
                "Required configuration file not found: {}",
                path.display()
            )));
        }

        Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(required)))
    }

    fn add_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Tests mutate process environment variables
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const DEFAULT_CONFIG: &str = r#"
[application]
name = "test-app"
version = "1.0.0"

[logger]
level = "info"

[logger.console]
enabled = true
colored = false

[engine]
default_timeout = 30
tick_interval_ms = 500
workers_per_type = 2

[retry]
max_retries = 3
strategy = "exponential"
initial_delay = 10

[[recurring]]
job_type = "log"
cron = "*/5 * * * *"
payload = { message = "heartbeat" }
"#;

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    /// Restores touched environment variables on drop
    struct EnvGuard {
        vars_to_restore: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            let mut guard = Self {
                vars_to_restore: Vec::new(),
            };
            guard.remove(CONFIG_DIR_ENV);
            guard.remove(CONFIG_FILE_ENV);
            guard.remove(AppEnvironment::ENV_VAR);
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            self.vars_to_restore
                .push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            self.vars_to_restore
                .push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original_value) in self.vars_to_restore.iter().rev() {
                unsafe {
                    match original_value {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_loader_new_default() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::new();

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(loader.config_dir(), Path::new("config"));
        assert!(loader.config_file.is_none());
        assert_eq!(loader.environment(), AppEnvironment::Development);
    }

    #[test]
    fn test_config_loader_mutual_exclusivity_error() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        env.set(CONFIG_DIR_ENV, "/custom/config");
        env.set(CONFIG_FILE_ENV, "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::MutualExclusivityError(msg)) => {
                assert!(msg.contains("JOBFORGE_CONFIG_DIR"));
                assert!(msg.contains("JOBFORGE_CONFIG_FILE"));
            }
            other => panic!("Expected MutualExclusivityError, got {other:?}"),
        }
    }

    #[test]
    fn test_config_loader_environment_from_env() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        env.set(AppEnvironment::ENV_VAR, "production");

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(loader.environment(), AppEnvironment::Production);
        assert_eq!(
            loader.with_environment(AppEnvironment::Test).environment(),
            AppEnvironment::Test
        );
    }

    #[test]
    fn test_load_missing_default_toml() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());

        match ConfigLoader::new().unwrap().load() {
            Err(ConfigError::FileNotFound(msg)) => assert!(msg.contains("default.toml")),
            other => panic!("Expected FileNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_default_toml_only() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.application.name, "test-app");
        assert_eq!(settings.engine.default_timeout, 30);
        assert_eq!(settings.engine.workers_per_type, 2);
        assert_eq!(settings.retry.initial_delay, 10);
        // Unset values fall back to serde defaults
        assert_eq!(settings.engine.idle_backoff_ms, 250);
        assert_eq!(settings.recurring.len(), 1);
        assert_eq!(settings.recurring[0].payload["message"], "heartbeat");
    }

    #[test]
    fn test_load_full_precedence_chain() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let staging = r#"
[application]
name = "staging-app"

[engine]
workers_per_type = 4
tick_interval_ms = 250
"#;
        let local = r#"
[engine]
workers_per_type = 8
"#;
        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("staging.toml", staging),
            ("local.toml", local),
        ]);

        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "staging");
        env.set("JOBFORGE_ENGINE__TICK_INTERVAL_MS", "100");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        // Environment variable beats every file
        assert_eq!(settings.engine.tick_interval_ms, 100);
        // local.toml beats staging.toml
        assert_eq!(settings.engine.workers_per_type, 8);
        // staging.toml beats default.toml
        assert_eq!(settings.application.name, "staging-app");
        assert_eq!(settings.application.version, "1.0.0");
    }

    #[test]
    fn test_optional_files_not_required() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "production");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");
        assert_eq!(settings.application.name, "test-app");
    }

    #[test]
    fn test_load_single_file_mode() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[("single.toml", "[engine]\nworkers_per_type = 3\n")]);
        env.set(CONFIG_FILE_ENV, temp_dir.path().join("single.toml").to_str().unwrap());

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");
        assert_eq!(settings.engine.workers_per_type, 3);
        assert_eq!(settings.application.name, "jobforge");
    }

    #[test]
    fn test_with_file_overrides_directory() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[("explicit.toml", "[retry]\nmax_retries = 7\n")]);

        let settings = ConfigLoader::new()
            .unwrap()
            .with_file(temp_dir.path().join("explicit.toml"))
            .load()
            .expect("Should load settings");
        assert_eq!(settings.retry.max_retries, 7);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set("JOBFORGE_ENGINE__WORKERS_PER_TYPE", "0");

        let err = ConfigLoader::new().unwrap().load().unwrap_err();
        assert_eq!(err.field(), Some("engine.workers_per_type"));
    }
}
