use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.voyageai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "voyage-4-large";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1024;
pub const DEFAULT_BATCH_SIZE: u32 = 16;
pub const DEFAULT_COLLECTION: &str = "patients";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("matchsync").join("config.toml"))
    }

    /// Load config from the default path, then apply environment overrides.
    pub fn load() -> Result<Self, crate::error::ConfigError> {
        let mut config = if let Some(path) = Self::config_path() {
            if path.exists() {
                Self::load_from(&path)?
            } else {
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, crate::error::ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<std::path::PathBuf, crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Environment variables win over the config file.
    pub fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("DATABASE_URL") {
            self.store.url = url;
        }
        if let Some(collection) = get("MATCHSYNC_COLLECTION") {
            self.store.collection = collection;
        }
        if let Some(url) = get("MATCHSYNC_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(key) = get("MATCHSYNC_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(model) = get("MATCHSYNC_MODEL") {
            self.embedding.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.store.collection.is_empty() {
            return Err(crate::error::ConfigError::ValidationError(
                "store.collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_store_url() -> String {
    "postgres://localhost:5432/membermatch".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            collection: default_collection(),
            pool_max: default_pool_max(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            api_key: None,
            model: default_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Abort the whole run on the first failed batch instead of
    /// recording it and continuing.
    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
