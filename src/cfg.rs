use crate::utils::get_config_file_path;
use anyhow::anyhow;
use config::{Environment, File, FileFormat};
use log::LevelFilter;
use serde::Deserialize;
use std::path::Path;
use vortex::ProvidersConfig;

const ENV_PREFIX: &str = "VORTEX";

const CONFIG_TEMPLATE: &str = r#"# Vortex configuration.
# Every value can be overridden from the environment, e.g. VORTEX__PROVIDERS__GCM__API_KEY.

log_level = "info"

[providers.http]
connect_timeout_secs = 60
timeout_secs = 120

# [providers.gcm]
# api_key = ""

# [providers.fcm]
# api_key = ""

# [providers.apns]
# auth_token = ""
# topic = "com.example.app"

# [providers.mpns]

# [providers.email]
# from = "noreply@example.com"
# smtp_host = "smtp.example.com"
# smtp_port = 587
# username = ""
# password = ""
"#;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    pub fn log_level(&self) -> anyhow::Result<LevelFilter> {
        match &self.log_level {
            None => Ok(LevelFilter::Info),
            Some(level) => level
                .parse()
                .map_err(|_| anyhow!("Invalid log level '{level}'")),
        }
    }
}

pub fn load_config(config_dir: &Path, create_config: bool) -> anyhow::Result<Config> {
    let config_file = get_config_file_path(config_dir);
    if create_config && !config_file.exists() {
        std::fs::write(&config_file, CONFIG_TEMPLATE)
            .map_err(|e| anyhow!("Failed to create config file '{config_file:?}': {e}"))?;
    }

    load_config_file(&config_file)
}

fn load_config_file(config_file: &Path) -> anyhow::Result<Config> {
    let file = File::from(config_file)
        .format(FileFormat::Toml)
        .required(false);
    config::Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!("Failed to load config '{config_file:?}': {e}"))?
        .try_deserialize()
        .map_err(|e| anyhow!("Failed to parse config '{config_file:?}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortex::ProviderType;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let name = format!("vortex-cfg-{name}-{}", std::process::id());
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn template_parses() {
        let dir = temp_dir("template");
        let _ = std::fs::remove_file(get_config_file_path(&dir));
        let config = load_config(&dir, true).unwrap();
        assert_eq!(config.log_level().unwrap(), LevelFilter::Info);
        assert_eq!(config.providers.http.timeout_secs, 120);
        assert!(config.providers.gcm.is_none());
        let result = vortex::new_dispatcher(ProviderType::Gcm, &config.providers);
        assert!(result.is_err());
    }

    #[test]
    fn provider_sections_deserialize() {
        let dir = temp_dir("providers");
        std::fs::write(
            get_config_file_path(&dir),
            r#"
log_level = "debug"

[providers.gcm]
api_key = "gcm-key"

[providers.apns]
auth_token = "jwt"
topic = "com.example.app"
"#,
        )
        .unwrap();

        let config = load_config(&dir, false).unwrap();
        assert_eq!(config.log_level().unwrap(), LevelFilter::Debug);
        let gcm = config.providers.gcm.unwrap();
        assert_eq!(gcm.api_key.expose(), "gcm-key");
        assert_eq!(gcm.send_url, vortex::providers::gcm::GCM_SEND_URL);
        assert_eq!(config.providers.apns.unwrap().topic, "com.example.app");
        assert!(config.providers.email.is_none());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = temp_dir("missing");
        let _ = std::fs::remove_file(get_config_file_path(&dir));
        let config = load_config(&dir, false).unwrap();
        assert!(config.log_level.is_none());
        assert_eq!(config.providers.http.connect_timeout_secs, 60);
    }
}
