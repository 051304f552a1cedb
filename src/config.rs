// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ANAC_OD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

fn default_primary_key() -> String {
    "cig".to_string()
}

fn default_day() -> String {
    "01".to_string()
}

fn default_concurrency() -> usize {
    3
}

fn default_log_file() -> PathBuf {
    PathBuf::from("anac_od_download.log")
}

/// Settings for one download/consolidation run, read from the `config:`
/// section of `config.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(rename = "YEAR_START_DOWNLOAD")]
    pub year_start: i32,
    #[serde(rename = "YEAR_END_DOWNLOAD")]
    pub year_end: i32,

    /// JSON file with the static URL list (`others` group).
    #[serde(rename = "ANAC_STATIC_URLS_JSON")]
    pub static_urls_json: PathBuf,
    /// JSON file with the dynamic patterns (primary key group and `others`).
    #[serde(rename = "ANAC_DYNAMIC_URLS_JSON")]
    pub dynamic_urls_json: PathBuf,
    /// JSON file with the merge prefixes (`prefixes` group).
    #[serde(rename = "ANAC_PREFIXES_JSON")]
    pub prefixes_json: PathBuf,

    /// Dataset key of the primary dynamic source.
    #[serde(rename = "CIG_PREFIX", default = "default_primary_key")]
    pub primary_key: String,
    #[serde(rename = "ANAC_OTHER_DATASET_NAMES", default)]
    pub other_dataset_names: Vec<String>,

    #[serde(default)]
    pub merge_do: bool,
    #[serde(default)]
    pub unzip_do: bool,

    #[serde(rename = "ANAC_DOWNLOAD_DIR")]
    pub download_dir: PathBuf,
    #[serde(rename = "OD_ANAC_DIR")]
    pub data_dir: PathBuf,

    #[serde(default = "default_day")]
    pub download_day: String,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_downloads: usize,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    config: AppConfig,
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(text).context("parsing config YAML")?;
        file.config.validate()?;
        Ok(file.config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading config {}", path.display()))
    }

    /// Load from `$ANAC_OD_CONFIG`, falling back to `config.yml`.
    pub fn load_default() -> Result<Self> {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            anyhow::bail!("MAX_CONCURRENT_DOWNLOADS must be at least 1");
        }
        if self.primary_key.is_empty() {
            anyhow::bail!("CIG_PREFIX must not be empty");
        }
        let day: u32 = self
            .download_day
            .trim()
            .parse()
            .with_context(|| format!("DOWNLOAD_DAY {:?} is not an integer", self.download_day))?;
        if !(1..=31).contains(&day) {
            anyhow::bail!("DOWNLOAD_DAY {} is out of range", day);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
config:
  YEAR_START_DOWNLOAD: 2021
  YEAR_END_DOWNLOAD: 2023
  ANAC_STATIC_URLS_JSON: cfg/static.json
  ANAC_DYNAMIC_URLS_JSON: cfg/dynamic.json
  ANAC_PREFIXES_JSON: cfg/prefixes.json
  ANAC_DOWNLOAD_DIR: data/anac
  OD_ANAC_DIR: data/od
"#;

    #[test]
    fn minimal_config_uses_defaults() -> Result<()> {
        let cfg = AppConfig::from_yaml(MINIMAL)?;
        assert_eq!(cfg.year_start, 2021);
        assert_eq!(cfg.year_end, 2023);
        assert_eq!(cfg.primary_key, "cig");
        assert!(cfg.other_dataset_names.is_empty());
        assert!(!cfg.merge_do);
        assert!(!cfg.unzip_do);
        assert_eq!(cfg.download_day, "01");
        assert_eq!(cfg.max_concurrent_downloads, 3);
        assert_eq!(cfg.download_dir, PathBuf::from("data/anac"));
        assert_eq!(cfg.log_file, PathBuf::from("anac_od_download.log"));
        Ok(())
    }

    #[test]
    fn reads_flags_and_other_datasets() -> Result<()> {
        let text = format!(
            "{}  MERGE_DO: true\n  UNZIP_DO: true\n  CIG_PREFIX: bando\n  ANAC_OTHER_DATASET_NAMES: [aggiudicazioni, partecipanti]\n  MAX_CONCURRENT_DOWNLOADS: 8\n",
            MINIMAL
        );
        let cfg = AppConfig::from_yaml(&text)?;
        assert!(cfg.merge_do);
        assert!(cfg.unzip_do);
        assert_eq!(cfg.primary_key, "bando");
        assert_eq!(cfg.other_dataset_names, vec!["aggiudicazioni", "partecipanti"]);
        assert_eq!(cfg.max_concurrent_downloads, 8);
        Ok(())
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let text = MINIMAL.replace("  OD_ANAC_DIR: data/od\n", "");
        assert!(AppConfig::from_yaml(&text).is_err());
    }

    #[test]
    fn rejects_zero_concurrency_and_bad_day() {
        let zero = format!("{}  MAX_CONCURRENT_DOWNLOADS: 0\n", MINIMAL);
        assert!(AppConfig::from_yaml(&zero).is_err());
        let day = format!("{}  DOWNLOAD_DAY: \"xx\"\n", MINIMAL);
        assert!(AppConfig::from_yaml(&day).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("config.yml")).unwrap_err();
        assert!(format!("{:#}", err).contains("config.yml"));
    }
}
