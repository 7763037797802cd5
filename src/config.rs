use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Deserialize)]
pub struct Config {
    pub upload: UploadConfig,
}

#[derive(Deserialize)]
pub struct UploadConfig {
    /// Backend base URL, e.g. "http://localhost:5000". The upload route
    /// lives at `<base_url>/api/upload/files`.
    pub base_url: String,
    /// MIME types accepted by the upload gate. Omit to accept the full
    /// default set; some deployments restrict this to spreadsheets + PDF.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_allowed_types() -> Vec<String> {
    crate::upload::DEFAULT_ALLOWED_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let cfg: Config = toml::from_str(
            r#"
            [upload]
            base_url = "https://invoice-backend.example.com"
            allowed_types = [
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/pdf",
            ]
            timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(cfg.upload.base_url, "https://invoice-backend.example.com");
        assert_eq!(cfg.upload.allowed_types.len(), 2);
        assert_eq!(cfg.upload.timeout_secs, 30);
    }

    #[test]
    fn test_optional_keys_default() {
        let cfg: Config = toml::from_str(
            r#"
            [upload]
            base_url = "http://localhost:5000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.upload.allowed_types.len(), 4);
        assert_eq!(cfg.upload.timeout_secs, 60);
    }
}
