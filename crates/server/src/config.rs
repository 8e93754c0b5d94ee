use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub temp_root: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub single_timeout_secs: u64,
    pub multi_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub output_cleanup_delay_secs: u64,
    pub max_concurrent_jobs: usize,
    pub max_upload_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            temp_root: PathBuf::from("/tmp/ffmpeg_service"),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            single_timeout_secs: 300,
            multi_timeout_secs: 600,
            probe_timeout_secs: 30,
            health_timeout_secs: 10,
            output_cleanup_delay_secs: 60,
            max_concurrent_jobs: 4,
            max_upload_bytes: 2_147_483_648, // 2 GiB
        }
    }
}

impl ServiceConfig {
    pub fn single_timeout(&self) -> Duration {
        Duration::from_secs(self.single_timeout_secs)
    }

    pub fn multi_timeout(&self) -> Duration {
        Duration::from_secs(self.multi_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn output_cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.output_cleanup_delay_secs)
    }
}

pub fn load_config(path: Option<&std::path::Path>) -> Result<ServiceConfig> {
    let config = if let Some(config_path) = path {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

            toml::from_str::<ServiceConfig>(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", config_path);
            ServiceConfig::default()
        }
    } else {
        tracing::info!("No config path provided, using defaults");
        ServiceConfig::default()
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    if config.temp_root.as_os_str().is_empty() {
        anyhow::bail!("temp_root cannot be empty");
    }

    if config.ffmpeg_bin.trim().is_empty() || config.ffprobe_bin.trim().is_empty() {
        anyhow::bail!("ffmpeg_bin and ffprobe_bin cannot be empty");
    }

    for (name, value) in [
        ("single_timeout_secs", config.single_timeout_secs),
        ("multi_timeout_secs", config.multi_timeout_secs),
        ("probe_timeout_secs", config.probe_timeout_secs),
        ("health_timeout_secs", config.health_timeout_secs),
    ] {
        if value == 0 {
            anyhow::bail!("{} must be at least 1", name);
        }
    }

    if config.max_concurrent_jobs == 0 {
        anyhow::bail!("max_concurrent_jobs must be at least 1");
    }

    if config.max_upload_bytes == 0 {
        anyhow::bail!("max_upload_bytes must be greater than 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn arb_service_config() -> impl Strategy<Value = ServiceConfig> {
        (
            "[a-z0-9.:]{1,20}",
            "/[a-z]{1,12}(/[a-z]{1,12}){0,2}",
            "[a-z/_-]{1,20}",
            "[a-z/_-]{1,20}",
            (1_u64..3600, 1_u64..3600, 1_u64..120, 1_u64..60),
            0_u64..3600,
            1_usize..32,
            1_u64..10_000_000_000,
        )
            .prop_map(
                |(
                    bind_addr,
                    temp_root,
                    ffmpeg_bin,
                    ffprobe_bin,
                    (single, multi, probe, health),
                    output_cleanup_delay_secs,
                    max_concurrent_jobs,
                    max_upload_bytes,
                )| ServiceConfig {
                    bind_addr,
                    temp_root: PathBuf::from(temp_root),
                    ffmpeg_bin,
                    ffprobe_bin,
                    single_timeout_secs: single,
                    multi_timeout_secs: multi,
                    probe_timeout_secs: probe,
                    health_timeout_secs: health,
                    output_cleanup_delay_secs,
                    max_concurrent_jobs,
                    max_upload_bytes,
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any valid configuration survives a TOML write/load cycle unchanged.
        #[test]
        fn prop_config_round_trip(config in arb_service_config()) {
            let toml_string = toml::to_string(&config)
                .expect("Failed to serialize config to TOML");

            let mut temp_file = NamedTempFile::new()
                .expect("Failed to create temp file");
            temp_file.write_all(toml_string.as_bytes())
                .expect("Failed to write to temp file");
            temp_file.flush()
                .expect("Failed to flush temp file");

            let loaded_config = load_config(Some(temp_file.path()))
                .expect("Failed to load config from file");

            prop_assert_eq!(config, loaded_config);
        }
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let non_existent_path = PathBuf::from("/tmp/non_existent_ffsvc_config_12345.toml");
        let config = load_config(Some(&non_existent_path)).expect("Should load defaults");
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_no_config_path_uses_defaults() {
        let config = load_config(None).expect("Should load defaults");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.single_timeout(), Duration::from_secs(300));
        assert_eq!(config.multi_timeout(), Duration::from_secs(600));
        assert_eq!(config.probe_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(b"this is not valid TOML {{{")
            .expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let result = load_config(Some(temp_file.path()));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse TOML"));
    }

    #[test]
    fn test_partial_config_with_defaults() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let partial_toml = r#"
temp_root = "/srv/ffsvc"
multi_timeout_secs = 900
"#;
        temp_file
            .write_all(partial_toml.as_bytes())
            .expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let config = load_config(Some(temp_file.path())).expect("Should load partial config");

        assert_eq!(config.temp_root, PathBuf::from("/srv/ffsvc"));
        assert_eq!(config.multi_timeout_secs, 900);
        assert_eq!(
            config.single_timeout_secs,
            ServiceConfig::default().single_timeout_secs
        );
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = ServiceConfig {
            probe_timeout_secs: 0,
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("probe_timeout_secs"));
    }

    #[test]
    fn test_validation_zero_concurrent_jobs() {
        let config = ServiceConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("max_concurrent_jobs"));
    }

    #[test]
    fn test_validation_empty_temp_root() {
        let config = ServiceConfig {
            temp_root: PathBuf::new(),
            ..Default::default()
        };

        assert!(validate_config(&config).is_err());
    }
}
