use crate::error::{Error, Result};
use crate::types::{FailurePolicy, OutputFormat, SinkKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_CONFIG_SECTION: &str = "resmon";

/// Fields that can be loaded from the TOML file. Anything left out keeps its default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorFileConfig {
    pub log_level: Option<String>,
    pub interval_ms: Option<u64>,
    pub sink: Option<SinkKind>,
    pub output_path: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub log_level: String,
    pub interval_ms: u64,
    pub sink: SinkKind,
    pub output_path: Option<String>,
    pub output_format: OutputFormat,
    pub failure_policy: FailurePolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_ms: 1000,
            sink: SinkKind::Stdout,
            output_path: None,
            output_format: OutputFormat::Text,
            failure_policy: FailurePolicy::Terminate,
        }
    }
}

impl MonitorConfig {
    /// File first, then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let explicit_path = env::var("RESMON_CONFIG_FILE").ok().filter(|p| !p.is_empty());
        let config_path = explicit_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        match fs::metadata(&config_path) {
            Ok(_) => {
                let section = env::var("RESMON_CONFIG_SECTION")
                    .unwrap_or_else(|_| DEFAULT_CONFIG_SECTION.to_string());
                let file_config = Self::from_file(&config_path, &section)?;
                config.apply_file(file_config);
            }
            Err(e) if explicit_path.is_some() => {
                return Err(Error::Configuration(format!(
                    "config file '{config_path}' not accessible: {e}"
                )));
            }
            Err(_) => {}
        }

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, section: &str) -> Result<MonitorFileConfig> {
        let contents = fs::read_to_string(path)?;
        Self::parse_section(&contents, section)
    }

    pub fn parse_section(contents: &str, section: &str) -> Result<MonitorFileConfig> {
        let config: HashMap<String, toml::Value> = toml::from_str(contents)?;

        let section_value = config.get(section).ok_or_else(|| {
            Error::Configuration(format!("config section '{section}' not found in TOML file"))
        })?;

        section_value.clone().try_into().map_err(|e| {
            Error::Configuration(format!("failed to parse config section '{section}': {e}"))
        })
    }

    pub fn apply_file(&mut self, file: MonitorFileConfig) {
        if let Some(val) = file.log_level {
            self.log_level = val;
        }
        if let Some(val) = file.interval_ms {
            self.interval_ms = val;
        }
        if let Some(val) = file.sink {
            self.sink = val;
        }
        if file.output_path.is_some() {
            self.output_path = file.output_path;
        }
        if let Some(val) = file.output_format {
            self.output_format = val;
        }
        if let Some(val) = file.failure_policy {
            self.failure_policy = val;
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(val) = env::var("RESMON_LOG_LEVEL") {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        if let Ok(val) = env::var("RESMON_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                self.interval_ms = interval;
            }
        }

        if let Ok(val) = env::var("RESMON_SINK") {
            if let Ok(sink) = val.parse() {
                self.sink = sink;
            }
        }

        if let Ok(val) = env::var("RESMON_OUTPUT_PATH") {
            if !val.is_empty() {
                self.output_path = Some(val);
            }
        }

        if let Ok(val) = env::var("RESMON_OUTPUT_FORMAT") {
            if let Ok(format) = val.parse() {
                self.output_format = format;
            }
        }

        if let Ok(val) = env::var("RESMON_FAILURE_POLICY") {
            if let Ok(policy) = val.parse() {
                self.failure_policy = policy;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Configuration(
                "interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.sink == SinkKind::File && self.output_path.is_none() {
            return Err(Error::Configuration(
                "file sink requires output_path (RESMON_OUTPUT_PATH)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Tests that touch RESMON_* variables share the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for var in [
            "RESMON_CONFIG_FILE",
            "RESMON_CONFIG_SECTION",
            "RESMON_LOG_LEVEL",
            "RESMON_INTERVAL_MS",
            "RESMON_SINK",
            "RESMON_OUTPUT_PATH",
            "RESMON_OUTPUT_FORMAT",
            "RESMON_FAILURE_POLICY",
        ] {
            env::remove_var(var);
        }
    }

    fn write_temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("resmon-{}-{}.toml", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.sink, SinkKind::Stdout);
        assert!(config.output_path.is_none());
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.failure_policy, FailurePolicy::Terminate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitor_config_interval() {
        let config = MonitorConfig {
            interval_ms: 250,
            ..Default::default()
        };

        assert_eq!(config.interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_monitor_config_validate_zero_interval() {
        let config = MonitorConfig {
            interval_ms: 0,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_monitor_config_validate_file_sink_without_path() {
        let config = MonitorConfig {
            sink: SinkKind::File,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = MonitorConfig {
            sink: SinkKind::File,
            output_path: Some("/tmp/resmon.log".to_string()),
            ..Default::default()
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitor_config_from_env_interval() {
        let _guard = env_lock();
        env::set_var("RESMON_INTERVAL_MS", "2500");
        let config = MonitorConfig::from_env();
        env::remove_var("RESMON_INTERVAL_MS");

        assert_eq!(config.interval_ms, 2500);
    }

    #[test]
    fn test_monitor_config_from_env_log_level() {
        let _guard = env_lock();
        env::set_var("RESMON_LOG_LEVEL", "debug");
        let config = MonitorConfig::from_env();
        env::remove_var("RESMON_LOG_LEVEL");

        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_monitor_config_from_env_sink_and_path() {
        let _guard = env_lock();
        env::set_var("RESMON_SINK", "file");
        env::set_var("RESMON_OUTPUT_PATH", "/var/log/resmon.log");
        let config = MonitorConfig::from_env();
        env::remove_var("RESMON_SINK");
        env::remove_var("RESMON_OUTPUT_PATH");

        assert_eq!(config.sink, SinkKind::File);
        assert_eq!(config.output_path.as_deref(), Some("/var/log/resmon.log"));
    }

    #[test]
    fn test_monitor_config_from_env_failure_policy_invalid() {
        let _guard = env_lock();
        env::set_var("RESMON_FAILURE_POLICY", "retry-forever");
        let config = MonitorConfig::from_env();
        env::remove_var("RESMON_FAILURE_POLICY");

        assert_eq!(config.failure_policy, FailurePolicy::Terminate);
    }

    #[test]
    fn test_monitor_config_from_env_output_format() {
        let _guard = env_lock();
        env::set_var("RESMON_OUTPUT_FORMAT", "json");
        let config = MonitorConfig::from_env();
        env::remove_var("RESMON_OUTPUT_FORMAT");

        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_section() {
        let contents = r#"
            [resmon]
            interval_ms = 500
            sink = "log"
            failure_policy = "skip"
            output_format = "json"
        "#;

        let file = MonitorConfig::parse_section(contents, "resmon").unwrap();
        let mut config = MonitorConfig::default();
        config.apply_file(file);

        assert_eq!(config.interval_ms, 500);
        assert_eq!(config.sink, SinkKind::Log);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_section_missing() {
        let contents = "[other]\ninterval_ms = 10\n";

        let result = MonitorConfig::parse_section(contents, "resmon");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_parse_section_bad_value() {
        let contents = "[resmon]\nsink = \"pane\"\n";

        let result = MonitorConfig::parse_section(contents, "resmon");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_file() {
        let path = env::temp_dir().join(format!("resmon-config-{}.toml", std::process::id()));
        fs::write(&path, "[monitor]\nlog_level = \"warn\"\ninterval_ms = 42\n").unwrap();

        let file = MonitorConfig::from_file(&path, "monitor").unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(file.log_level.as_deref(), Some("warn"));
        assert_eq!(file.interval_ms, Some(42));
        assert!(file.sink.is_none());
    }

    #[test]
    fn test_load_without_default_file_uses_defaults() {
        let _guard = env_lock();
        clear_env();
        assert!(fs::metadata(DEFAULT_CONFIG_PATH).is_err());

        let config = MonitorConfig::load().unwrap();

        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.sink, SinkKind::Stdout);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let _guard = env_lock();
        clear_env();
        let path = env::temp_dir().join(format!("resmon-missing-{}.toml", std::process::id()));
        let _ = fs::remove_file(&path);

        env::set_var("RESMON_CONFIG_FILE", &path);
        let result = MonitorConfig::load();
        clear_env();

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_env_overrides_file() {
        let _guard = env_lock();
        clear_env();
        let path = write_temp_config(
            "override",
            "[resmon]\ninterval_ms = 500\nfailure_policy = \"skip\"\n",
        );

        env::set_var("RESMON_CONFIG_FILE", &path);
        env::set_var("RESMON_INTERVAL_MS", "250");
        let result = MonitorConfig::load();
        clear_env();
        fs::remove_file(&path).unwrap();

        let config = result.unwrap();
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
    }

    #[test]
    fn test_load_validates_after_merge() {
        let _guard = env_lock();
        clear_env();
        let path = write_temp_config("nopath", "[resmon]\nsink = \"file\"\n");

        env::set_var("RESMON_CONFIG_FILE", &path);
        let result = MonitorConfig::load();
        clear_env();
        fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_uses_named_section() {
        let _guard = env_lock();
        clear_env();
        let path = write_temp_config(
            "section",
            "[resmon]\ninterval_ms = 500\n\n[staging]\ninterval_ms = 750\nsink = \"log\"\n",
        );

        env::set_var("RESMON_CONFIG_FILE", &path);
        env::set_var("RESMON_CONFIG_SECTION", "staging");
        let result = MonitorConfig::load();
        clear_env();
        fs::remove_file(&path).unwrap();

        let config = result.unwrap();
        assert_eq!(config.interval_ms, 750);
        assert_eq!(config.sink, SinkKind::Log);
    }
}
