use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Largest single file accepted, e.g. "512MB".
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
    /// Largest whole request body accepted on the upload route.
    #[serde(default = "default_max_request")]
    pub max_request_size: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size: default_max_upload(),
            max_request_size: default_max_request(),
        }
    }
}

impl MediaConfig {
    pub fn max_upload_bytes(&self) -> Result<u64> {
        parse_size(&self.max_upload_size)
    }

    pub fn max_request_bytes(&self) -> Result<u64> {
        parse_size(&self.max_request_size)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4500
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload() -> String {
    "512MB".to_string()
}

fn default_max_request() -> String {
    "2GB".to_string()
}

/// Parses a human size such as `512MB` or `64 KB` into bytes. Multiples are
/// binary (1KB = 1024 bytes); a bare number is taken as bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        anyhow::bail!("Invalid size '{}': expected a number like 512MB", input);
    }

    let value: u64 = digits.parse()?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Invalid size unit '{}' in '{}'", other, input),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size '{}' is too large", input))
}

/// Formats a byte count the way sizes are written in the config file.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 3] = [
        ("GB", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
    ];

    for (suffix, factor) in UNITS {
        if bytes >= factor && bytes % factor == 0 {
            return format!("{}{}", bytes / factor, suffix);
        }
    }
    format!("{}B", bytes)
}

impl Config {
    /// Reads `path` if it exists, otherwise falls back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Could not read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.media.upload_dir.as_os_str().is_empty() {
            anyhow::bail!("media.upload_dir must not be empty");
        }
        let max_upload = self.media.max_upload_bytes()?;
        if max_upload == 0 {
            anyhow::bail!("media.max_upload_size must be greater than 0");
        }
        let max_request = self.media.max_request_bytes()?;
        if max_request < max_upload {
            anyhow::bail!("media.max_request_size must be at least media.max_upload_size");
        }
        Ok(())
    }
}
