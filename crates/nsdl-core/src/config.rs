//! Settings resolution: environment, config store, then interactive prompt.
//!
//! The resolved `Settings` value is immutable and passed explicitly into each
//! pipeline stage.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_REGION: &str = "asia";
pub const DEFAULT_OUTPUT_DIR: &str = "./output_files";
pub const DEFAULT_API_BASE: &str = "https://o9k5xn5546.execute-api.us-east-1.amazonaws.com/v1";

pub const ENV_TOKEN: &str = "NUSCENES_TOKEN";
pub const ENV_REGION: &str = "NUSCENES_REGION";
pub const ENV_OUTPUT_DIR: &str = "NUSCENES_OUTPUT_DIR";
pub const ENV_API_BASE: &str = "NUSCENES_API_BASE";

/// Config file looked up in the working directory before the XDG location.
pub const LOCAL_CONFIG_FILE: &str = "config.json";

/// Contents of the optional config store (`config.json` or `config.toml`).
/// Every field is optional; unknown fields are ignored.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoredConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Alternate key for the bearer token.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl fmt::Debug for StoredConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredConfig")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("output_dir", &self.output_dir)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Path of the config store to use: the explicit path if given, otherwise
/// `./config.json` if present, otherwise `$XDG_CONFIG_HOME/nsdl/config.toml` if present.
pub fn locate_store(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    xdg::BaseDirectories::with_prefix("nsdl")
        .ok()
        .and_then(|dirs| dirs.find_config_file("config.toml"))
}

/// Load a config store. A missing or blank file yields an empty config.
/// Files ending in `.toml` are parsed as TOML, anything else as JSON.
pub fn load_store(path: &Path) -> Result<StoredConfig> {
    if !path.exists() {
        return Ok(StoredConfig::default());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_store(&raw, is_toml(path)).with_context(|| format!("parse {}", path.display()))
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

fn parse_store(raw: &str, toml_format: bool) -> Result<StoredConfig> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(StoredConfig::default());
    }
    if toml_format {
        Ok(toml::from_str(raw)?)
    } else {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Command-line overrides; take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub output_dir: Option<PathBuf>,
}

/// Immutable run settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub credential: String,
    pub region: String,
    pub output_dir: PathBuf,
    /// Base URL of the archive API, without trailing slash.
    pub api_base: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("credential", &"<redacted>")
            .field("region", &self.region)
            .field("output_dir", &self.output_dir)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from `env`, the config store and, for the credential
    /// only, `prompt`. `prompt` is only called when no other source has a token.
    ///
    /// Sources are tried in order and the first non-empty value wins; it is then
    /// trimmed, and a blank region/output dir falls back to its default.
    pub fn resolve<E, P>(
        env: E,
        stored: &StoredConfig,
        overrides: &Overrides,
        prompt: P,
    ) -> Result<Settings, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        P: FnOnce() -> io::Result<String>,
    {
        let mut credential = first_non_empty([
            env(ENV_TOKEN),
            stored.bearer_token.clone(),
            stored.token.clone(),
        ])
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

        if credential.is_empty() {
            credential = prompt().map_err(ConfigError::Prompt)?.trim().to_string();
        }
        if credential.is_empty() {
            return Err(ConfigError::MissingCredential);
        }

        let region = match overrides.region.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => or_default(
                first_non_empty([env(ENV_REGION), stored.region.clone()]),
                DEFAULT_REGION,
            ),
        };

        let output_dir = resolve_output_dir(&env, stored, overrides);

        let api_base = or_default(
            first_non_empty([env(ENV_API_BASE), stored.api_base.clone()]),
            DEFAULT_API_BASE,
        )
        .trim_end_matches('/')
        .to_string();

        Ok(Settings {
            credential,
            region,
            output_dir,
            api_base,
        })
    }

    /// Resolve against the real process environment.
    pub fn from_process_env<P>(
        stored: &StoredConfig,
        overrides: &Overrides,
        prompt: P,
    ) -> Result<Settings, ConfigError>
    where
        P: FnOnce() -> io::Result<String>,
    {
        Self::resolve(|key| std::env::var(key).ok(), stored, overrides, prompt)
    }

    /// Where an archive lands on disk before any content-type rewrite.
    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }
}

/// Output directory alone; used by offline commands that need no credential.
pub fn resolve_output_dir<E>(env: E, stored: &StoredConfig, overrides: &Overrides) -> PathBuf
where
    E: Fn(&str) -> Option<String>,
{
    match &overrides.output_dir {
        Some(p) if !p.as_os_str().is_empty() => p.clone(),
        _ => PathBuf::from(or_default(
            first_non_empty([env(ENV_OUTPUT_DIR), stored.output_dir.clone()]),
            DEFAULT_OUTPUT_DIR,
        )),
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_prompt() -> io::Result<String> {
        panic!("prompt must not be called")
    }

    #[test]
    fn env_wins_over_store() {
        let stored = StoredConfig {
            bearer_token: Some("from-store".into()),
            region: Some("us".into()),
            output_dir: Some("/store".into()),
            ..Default::default()
        };
        let env = env_from(&[
            (ENV_TOKEN, " from-env "),
            (ENV_REGION, "asia"),
            (ENV_OUTPUT_DIR, "/env"),
        ]);
        let s = Settings::resolve(env, &stored, &Overrides::default(), no_prompt).unwrap();
        assert_eq!(s.credential, "from-env");
        assert_eq!(s.region, "asia");
        assert_eq!(s.output_dir, PathBuf::from("/env"));
        assert_eq!(s.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn store_token_alternate_key() {
        let stored = StoredConfig {
            token: Some("alt".into()),
            ..Default::default()
        };
        let s = Settings::resolve(env_from(&[]), &stored, &Overrides::default(), no_prompt)
            .unwrap();
        assert_eq!(s.credential, "alt");
        assert_eq!(s.region, DEFAULT_REGION);
        assert_eq!(s.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn bearer_token_preferred_over_token() {
        let stored = StoredConfig {
            bearer_token: Some("primary".into()),
            token: Some("alt".into()),
            ..Default::default()
        };
        let s = Settings::resolve(env_from(&[]), &stored, &Overrides::default(), no_prompt)
            .unwrap();
        assert_eq!(s.credential, "primary");
    }

    #[test]
    fn prompt_used_as_last_resort() {
        let s = Settings::resolve(
            env_from(&[(ENV_TOKEN, "")]),
            &StoredConfig::default(),
            &Overrides::default(),
            || Ok("typed\n".to_string()),
        )
        .unwrap();
        assert_eq!(s.credential, "typed");
    }

    #[test]
    fn missing_everywhere_is_config_error() {
        let prompted = Cell::new(0);
        let err = Settings::resolve(
            env_from(&[]),
            &StoredConfig::default(),
            &Overrides::default(),
            || {
                prompted.set(prompted.get() + 1);
                Ok("   ".to_string())
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
        assert_eq!(prompted.get(), 1);
    }

    #[test]
    fn prompt_io_failure_is_reported() {
        let err = Settings::resolve(
            env_from(&[]),
            &StoredConfig::default(),
            &Overrides::default(),
            || Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Prompt(_)));
    }

    #[test]
    fn blank_region_and_output_dir_fall_back_to_defaults() {
        let stored = StoredConfig {
            bearer_token: Some("t".into()),
            region: Some("us".into()),
            ..Default::default()
        };
        // A whitespace env value shadows the store, then trims to the default.
        let env = env_from(&[(ENV_REGION, "   "), (ENV_OUTPUT_DIR, "  ")]);
        let s = Settings::resolve(env, &stored, &Overrides::default(), no_prompt).unwrap();
        assert_eq!(s.region, DEFAULT_REGION);
        assert_eq!(s.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = Overrides {
            region: Some("us".into()),
            output_dir: Some(PathBuf::from("/cli")),
        };
        let env = env_from(&[(ENV_TOKEN, "t"), (ENV_REGION, "asia"), (ENV_OUTPUT_DIR, "/env")]);
        let s = Settings::resolve(env, &StoredConfig::default(), &overrides, no_prompt).unwrap();
        assert_eq!(s.region, "us");
        assert_eq!(s.output_dir, PathBuf::from("/cli"));
    }

    #[test]
    fn api_base_trailing_slash_removed() {
        let env = env_from(&[(ENV_TOKEN, "t"), (ENV_API_BASE, "http://127.0.0.1:9000/v1/")]);
        let s = Settings::resolve(env, &StoredConfig::default(), &Overrides::default(), no_prompt)
            .unwrap();
        assert_eq!(s.api_base, "http://127.0.0.1:9000/v1");
        assert_eq!(
            s.local_path("v1.0-test_meta.tgz"),
            PathBuf::from(DEFAULT_OUTPUT_DIR).join("v1.0-test_meta.tgz")
        );
    }

    #[test]
    fn debug_output_redacts_credential() {
        let env = env_from(&[(ENV_TOKEN, "secret-token")]);
        let s = Settings::resolve(env, &StoredConfig::default(), &Overrides::default(), no_prompt)
            .unwrap();
        assert!(!format!("{:?}", s).contains("secret-token"));
    }

    #[test]
    fn store_json_fields() {
        let raw = r#"{"bearer_token": "abc", "region": "us", "output_dir": "/data", "extra": 1}"#;
        let cfg = parse_store(raw, false).unwrap();
        assert_eq!(cfg.bearer_token.as_deref(), Some("abc"));
        assert_eq!(cfg.region.as_deref(), Some("us"));
        assert_eq!(cfg.output_dir.as_deref(), Some("/data"));
        assert!(cfg.token.is_none());
    }

    #[test]
    fn store_toml_fields() {
        let raw = r#"
            token = "abc"
            api_base = "http://mirror.local/v1"
        "#;
        let cfg = parse_store(raw, true).unwrap();
        assert_eq!(cfg.token.as_deref(), Some("abc"));
        assert_eq!(cfg.api_base.as_deref(), Some("http://mirror.local/v1"));
    }

    #[test]
    fn blank_and_missing_store_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.json");
        assert_eq!(load_store(&missing).unwrap(), StoredConfig::default());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        assert_eq!(load_store(&blank).unwrap(), StoredConfig::default());
    }

    #[test]
    fn malformed_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("config.json");
        fs::write(&bad, "{not json").unwrap();
        let err = load_store(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("config.json"));
    }

    #[test]
    fn output_dir_without_credential() {
        let stored = StoredConfig {
            output_dir: Some(" /store ".into()),
            ..Default::default()
        };
        let dir = resolve_output_dir(env_from(&[]), &stored, &Overrides::default());
        assert_eq!(dir, PathBuf::from("/store"));
    }

    #[test]
    fn explicit_store_path_is_used_verbatim() {
        let p = Path::new("/etc/nsdl.toml");
        assert_eq!(locate_store(Some(p)), Some(p.to_path_buf()));
    }
}
