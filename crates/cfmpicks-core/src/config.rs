// Configuration loading and parsing (server.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub db_path: String,
    pub league: LeagueRules,
    pub payments: PaymentsConfig,
    pub sheets: SheetsConfig,
    pub blurbs: BlurbsConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire server.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    server: ServerConfig,
    database: DatabaseSection,
    league: LeagueRules,
    payments: PaymentsConfig,
    sheets: SheetsConfig,
    blurbs: BlurbsConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Also log to stdout in addition to `logs/cfmpicks.log`.
    #[serde(default)]
    pub log_stdout: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueRules {
    /// How many random join codes to try before giving up on creation.
    pub max_code_attempts: u32,
    /// Upper bound on active members per league.
    pub max_members: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Flat fee for the one-time league upgrade, in the currency's minor unit.
    pub upgrade_fee_cents: u64,
    pub currency: String,
    pub api_base: String,
    /// Maximum age of a webhook signature timestamp.
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub api_base: String,
    /// Spreadsheet holding the `Leagues` and `UserRoles` ranges.
    #[serde(default)]
    pub bootstrap_spreadsheet_id: Option<String>,
    pub mirror_queue_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlurbsConfig {
    pub model: String,
    pub max_tokens: u32,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Key used to verify bearer tokens issued by the identity provider.
    pub auth_signing_key: Option<String>,
    pub sheets_access_token: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/server.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let server_path = config_dir.join("server.toml");
    let server_text = read_file(&server_path)?;
    let file: ServerFile = toml::from_str(&server_text).map_err(|e| ConfigError::ParseError {
        path: server_path.clone(),
        source: e,
    })?;

    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        server: file.server,
        db_path: file.database.path,
        league: file.league,
        payments: file.payments,
        sheets: file.sheets,
        blurbs: file.blurbs,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying default
/// config files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    let counts: &[(&str, u64)] = &[
        ("league.max_code_attempts", u64::from(config.league.max_code_attempts)),
        ("league.max_members", u64::from(config.league.max_members)),
        ("payments.upgrade_fee_cents", config.payments.upgrade_fee_cents),
        ("sheets.mirror_queue_size", config.sheets.mirror_queue_size as u64),
        ("blurbs.max_tokens", u64::from(config.blurbs.max_tokens)),
        ("blurbs.cache_capacity", config.blurbs.cache_capacity as u64),
        ("blurbs.cache_ttl_secs", config.blurbs.cache_ttl_secs),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    let currency = &config.payments.currency;
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(invalid(
            "payments.currency",
            format!("must be a lowercase ISO 4217 code, got `{currency}`"),
        ));
    }

    if config.payments.webhook_tolerance_secs <= 0 {
        return Err(invalid(
            "payments.webhook_tolerance_secs",
            format!("must be > 0, got {}", config.payments.webhook_tolerance_secs),
        ));
    }

    for (name, url) in [
        ("payments.api_base", &config.payments.api_base),
        ("sheets.api_base", &config.sheets.api_base),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(name, format!("must be an http(s) URL, got `{url}`")));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Returns the workspace root holding `defaults/` (works whether
    /// `cargo test` runs from the crate directory or the workspace root).
    fn project_root() -> PathBuf {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        manifest_dir
            .ancestors()
            .find(|p| p.join("defaults/server.toml").exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| panic!("cannot locate defaults/ above {manifest_dir:?}"))
    }

    /// Fresh temp dir with `config/server.toml` copied from defaults.
    fn temp_with_server_toml(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/server.toml"),
            tmp.join("config/server.toml"),
        )
        .unwrap();
        tmp
    }

    fn rewrite_server_toml(tmp: &Path, from: &str, to: &str) {
        let path = tmp.join("config/server.toml");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "defaults no longer contain `{from}`");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_validation_field(tmp: &Path, expected: &str) {
        match load_config_from(tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = temp_with_server_toml("cfmpicks_config_defaults");
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.db_path, "cfmpicks.db");
        assert_eq!(config.league.max_code_attempts, 10);
        assert_eq!(config.league.max_members, 64);
        assert_eq!(config.payments.upgrade_fee_cents, 999);
        assert_eq!(config.payments.currency, "usd");
        assert_eq!(config.payments.webhook_tolerance_secs, 300);
        assert_eq!(config.sheets.mirror_queue_size, 256);
        assert!(config.sheets.bootstrap_spreadsheet_id.is_none());
        assert_eq!(config.blurbs.cache_capacity, 256);
        assert!(config.credentials.auth_signing_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_is_read_when_present() {
        let tmp = temp_with_server_toml("cfmpicks_config_creds");
        fs::write(
            tmp.join("config/credentials.toml"),
            "auth_signing_key = \"k\"\nstripe_webhook_secret = \"whsec_test\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.credentials.auth_signing_key.as_deref(), Some("k"));
        assert_eq!(
            config.credentials.stripe_webhook_secret.as_deref(),
            Some("whsec_test")
        );
        assert!(config.credentials.sheets_access_token.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_port() {
        let tmp = temp_with_server_toml("cfmpicks_config_zero_port");
        rewrite_server_toml(&tmp, "port = 8787", "port = 0");
        expect_validation_field(&tmp, "server.port");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_fee() {
        let tmp = temp_with_server_toml("cfmpicks_config_zero_fee");
        rewrite_server_toml(&tmp, "upgrade_fee_cents = 999", "upgrade_fee_cents = 0");
        expect_validation_field(&tmp, "payments.upgrade_fee_cents");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_currency() {
        let tmp = temp_with_server_toml("cfmpicks_config_currency");
        rewrite_server_toml(&tmp, "currency = \"usd\"", "currency = \"USD\"");
        expect_validation_field(&tmp, "payments.currency");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_cache_capacity() {
        let tmp = temp_with_server_toml("cfmpicks_config_cache");
        rewrite_server_toml(&tmp, "cache_capacity = 256", "cache_capacity = 0");
        expect_validation_field(&tmp, "blurbs.cache_capacity");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_http_api_base() {
        let tmp = temp_with_server_toml("cfmpicks_config_api_base");
        rewrite_server_toml(
            &tmp,
            "api_base = \"https://sheets.googleapis.com\"",
            "api_base = \"sheets.googleapis.com\"",
        );
        expect_validation_field(&tmp, "sheets.api_base");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_server_toml() {
        let tmp = std::env::temp_dir().join("cfmpicks_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("server.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = std::env::temp_dir().join("cfmpicks_config_invalid");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/server.toml"), "this is not valid [[[ toml").unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("server.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_examples() {
        let tmp = std::env::temp_dir().join("cfmpicks_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::copy(
            project_root().join("defaults/server.toml"),
            defaults_dir.join("server.toml"),
        )
        .unwrap();
        fs::write(
            defaults_dir.join("credentials.toml.example"),
            "auth_signing_key = \"...\"\n",
        )
        .unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/server.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // A second run leaves the existing file alone.
        fs::write(tmp.join("config/server.toml"), "# custom\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(tmp.join("config/server.toml")).unwrap(),
            "# custom\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("cfmpicks_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
