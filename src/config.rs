use crate::app::EngineConfig;
use crate::cli::CliArgs;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_REFRESH_SECS: i64 = 30;
const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    read_only: Option<bool>,
    refresh_secs: Option<i64>,
    shell: Option<String>,
    profile: Option<String>,
    region: Option<String>,
    cluster: Option<String>,
    log_file: Option<PathBuf>,
    log_filter: Option<String>,
}

/// Effective settings after merging flags over the config file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub read_only: bool,
    pub refresh_secs: i64,
    pub shell: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub cluster: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_filter: String,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let file = match &path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        Ok(merge(args, file, path))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            read_only: self.read_only,
            refresh_secs: self.refresh_secs,
            shell: self.shell.clone(),
            profile: self.profile.clone(),
            region: self.region.clone(),
            cluster: self.cluster.clone(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn merge(args: &CliArgs, file: ConfigFile, source: Option<PathBuf>) -> Settings {
    let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    Settings {
        source,
        read_only: args.read_only || file.read_only.unwrap_or(false),
        refresh_secs: args
            .refresh
            .or(file.refresh_secs)
            .unwrap_or(DEFAULT_REFRESH_SECS),
        shell: non_empty(args.shell.clone())
            .or(non_empty(file.shell))
            .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
        profile: non_empty(args.profile.clone()).or(non_empty(file.profile)),
        region: non_empty(args.region.clone()).or(non_empty(file.region)),
        cluster: non_empty(args.cluster.clone()).or(non_empty(file.cluster)),
        log_file: args.log_file.clone().or(file.log_file),
        log_filter: non_empty(args.log_filter.clone())
            .or(non_empty(file.log_filter))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ECSNAV_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("ecsnav.yaml"), PathBuf::from(".ecsnav.yaml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config/ecsnav/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{ConfigFile, Settings, merge, read_config_file};
    use crate::cli::CliArgs;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let settings = merge(&CliArgs::default(), ConfigFile::default(), None);
        assert_eq!(settings.refresh_secs, 30);
        assert_eq!(settings.shell, "/bin/sh");
        assert_eq!(settings.log_filter, "info");
        assert!(!settings.read_only);
        assert!(settings.profile.is_none());
    }

    #[test]
    fn flags_override_file_values() {
        let file = ConfigFile {
            refresh_secs: Some(10),
            shell: Some("/bin/bash".to_string()),
            profile: Some("dev".to_string()),
            read_only: Some(true),
            ..ConfigFile::default()
        };
        let args = CliArgs {
            refresh: Some(0),
            profile: Some("prod".to_string()),
            ..CliArgs::default()
        };
        let settings = merge(&args, file, Some(PathBuf::from("ecsnav.yaml")));
        assert_eq!(settings.refresh_secs, 0);
        assert_eq!(settings.profile.as_deref(), Some("prod"));
        assert_eq!(settings.shell, "/bin/bash");
        assert!(settings.read_only);
        assert!(!settings.engine_config().refresh_enabled());
    }

    #[test]
    fn yaml_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "read_only: true\nrefresh_secs: 5\nregion: eu-west-1\ncluster: prod"
        )
        .expect("write");

        let parsed = read_config_file(file.path()).expect("config");
        let settings: Settings = merge(&CliArgs::default(), parsed, None);
        assert!(settings.read_only);
        assert_eq!(settings.refresh_secs, 5);
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.engine_config().cluster.as_deref(), Some("prod"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "refresh_ms: 5").expect("write");
        assert!(read_config_file(file.path()).is_err());
    }
}
