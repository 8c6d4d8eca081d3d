use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/hlsget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsgetConfig {
    /// Worker pool size for segment downloads (clamped to 1..=32 at run time).
    pub concurrency: usize,
    /// Merge segments into an MP4 automatically after a successful download.
    pub auto_merge: bool,
    /// Path to the ffmpeg binary. Missing means `ffmpeg` on PATH.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Default request headers (e.g. User-Agent, Referer) sent with every
    /// request unless the caller overrides them by name.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HlsgetConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            auto_merge: true,
            ffmpeg_path: None,
            headers: HashMap::new(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HlsgetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HlsgetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HlsgetConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HlsgetConfig::default();
        assert_eq!(cfg.concurrency, 8);
        assert!(cfg.auto_merge);
        assert!(cfg.ffmpeg_path.is_none());
        assert!(cfg.headers.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = HlsgetConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: HlsgetConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.concurrency, cfg.concurrency);
        assert_eq!(parsed.auto_merge, cfg.auto_merge);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            concurrency = 4
            auto_merge = false
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
        "#;
        let cfg: HlsgetConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert!(!cfg.auto_merge);
        assert_eq!(
            cfg.ffmpeg_path.as_deref(),
            Some(std::path::Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
    }

    #[test]
    fn config_toml_headers_table() {
        let toml = r#"
            concurrency = 8
            auto_merge = true

            [headers]
            User-Agent = "Mozilla/5.0"
            Referer = "https://example.com/"
        "#;
        let cfg: HlsgetConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));
        assert_eq!(
            cfg.headers.get("Referer").map(String::as_str),
            Some("https://example.com/")
        );
    }
}
