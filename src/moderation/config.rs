use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Connection settings injected into the remote store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bucket() -> String {
    "dream-media".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            bucket: default_bucket(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModerationConfig {
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialModerationConfig {
    store: Option<StoreConfig>,
}

fn parse_u64_setting(var: &str, raw: Option<&str>, fallback: u64) -> Result<u64> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| anyhow!("invalid {var} `{v}`: expected a whole number")),
        None => Ok(fallback),
    }
}

fn env_or_u64(var: &str, fallback: u64) -> Result<u64> {
    parse_u64_setting(var, env::var(var).ok().as_deref(), fallback)
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &ModerationConfig) -> Result<()> {
    let store = &cfg.store;
    if store.url.trim().is_empty() {
        return Err(anyhow!(
            "missing store url: set MODERACAO_STORE_URL or [store].url"
        ));
    }
    if !store.url.starts_with("http://") && !store.url.starts_with("https://") {
        return Err(anyhow!(
            "invalid store url `{}`: must start with http:// or https://",
            store.url
        ));
    }
    if store.service_key.trim().is_empty() {
        return Err(anyhow!(
            "missing service key: set MODERACAO_SERVICE_KEY or [store].service_key"
        ));
    }
    if store.bucket.trim().is_empty() || store.bucket.contains('/') {
        return Err(anyhow!("invalid bucket: must be a single non-empty segment"));
    }
    if store.request_timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("MODERACAO_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir()?;
    Some(base.join("moderacao").join("moderacao.toml"))
}

fn merge_file_config(base: &mut ModerationConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialModerationConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse moderation config {}: {err}", path.display()))?;
    if let Some(store) = parsed.store {
        base.store = store;
    }
    Ok(())
}

pub fn load_config() -> Result<ModerationConfig> {
    let mut cfg = ModerationConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.store.url = env_or_string("MODERACAO_STORE_URL", &cfg.store.url)
        .trim_end_matches('/')
        .to_string();
    cfg.store.service_key = env_or_string("MODERACAO_SERVICE_KEY", &cfg.store.service_key);
    cfg.store.bucket = env_or_string("MODERACAO_BUCKET", &cfg.store.bucket);
    cfg.store.request_timeout_secs = env_or_u64(
        "MODERACAO_REQUEST_TIMEOUT_SECS",
        cfg.store.request_timeout_secs,
    )?;

    validate(&cfg)?;
    Ok(cfg)
}
