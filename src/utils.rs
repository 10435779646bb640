use crate::APP_IDENTIFIER;
use anyhow::anyhow;
use std::path::{Path, PathBuf};

pub fn get_default_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir =
        dirs::config_local_dir().ok_or(anyhow!("Failed to get configuration directory"))?;
    let config_dir = config_dir.join(APP_IDENTIFIER);
    Ok(config_dir)
}

pub fn get_default_log_dir() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(anyhow!("Failed to get data directory"))?;
    let data_dir = data_dir.join(APP_IDENTIFIER);
    Ok(data_dir)
}

pub fn get_config_file_path(p: impl AsRef<Path>) -> PathBuf {
    p.as_ref().join("config.toml")
}

/// Split a `key=value` command line argument.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("url=https://a/?b=c"),
            Ok(("url".to_string(), "https://a/?b=c".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
