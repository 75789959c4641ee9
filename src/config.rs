use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Which blob backend holds file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Local,
    Memory,
    Cos,
}

impl BlobBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(BlobBackend::Local),
            "memory" => Some(BlobBackend::Memory),
            "cos" => Some(BlobBackend::Cos),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BlobBackend,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub cos: CosConfig,
}

/// Object storage settings; the bucket is the namespace every blob lives in
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CosConfig {
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    /// Key prefix inside the bucket
    #[serde(default)]
    pub base_path: String,
    /// Overrides `<bucket>.cos.<region>.myqcloud.com`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_mb() -> usize {
    100
}

fn default_db_path() -> String {
    "data/hashvault.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_backend() -> BlobBackend {
    BlobBackend::Local
}

fn default_local_path() -> String {
    "data/blobs".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            cos: CosConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.validate()?;
        config.ensure_directories()?;
        tracing::info!(
            "Blob backend: {:?}, database: {}",
            config.storage.backend,
            config.database.path
        );
        Ok(config)
    }

    /// Load configuration from hashvault.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = [
            "hashvault.toml",
            "config.toml",
            "data/hashvault.toml",
            "data/config.toml",
        ];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    /// Format: HV_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(val) = lookup("HV_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("HV_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Some(val) = lookup("HV_CONF_SERVER_MAX_UPLOAD_MB") {
            if let Ok(mb) = val.parse() {
                self.server.max_upload_mb = mb;
            }
        }

        // Database overrides
        if let Some(val) = lookup("HV_CONF_DATABASE_PATH") {
            self.database.path = val;
        }
        if let Some(val) = lookup("HV_CONF_DATABASE_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                self.database.max_connections = n;
            }
        }

        // Storage overrides
        if let Some(val) = lookup("HV_CONF_STORAGE_BACKEND") {
            match BlobBackend::from_str(&val) {
                Some(backend) => self.storage.backend = backend,
                None => tracing::warn!("Ignoring unknown storage backend {:?}", val),
            }
        }
        if let Some(val) = lookup("HV_CONF_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_SECRET_ID") {
            self.storage.cos.secret_id = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_SECRET_KEY") {
            self.storage.cos.secret_key = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_BUCKET") {
            self.storage.cos.bucket = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_REGION") {
            self.storage.cos.region = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_BASE_PATH") {
            self.storage.cos.base_path = val;
        }
        if let Some(val) = lookup("HV_CONF_COS_ENDPOINT") {
            if !val.trim().is_empty() {
                self.storage.cos.endpoint = Some(val);
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.storage.backend == BlobBackend::Cos {
            let cos = &self.storage.cos;
            if cos.bucket.is_empty() || cos.secret_id.is_empty() || cos.secret_key.is_empty() {
                anyhow::bail!("COS backend requires bucket, secret_id and secret_key");
            }
            if cos.region.is_empty() && cos.endpoint.is_none() {
                anyhow::bail!("COS backend requires a region or an explicit endpoint");
            }
        }
        Ok(())
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        if self.storage.backend == BlobBackend::Local {
            fs::create_dir_all(&self.storage.local_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.storage.backend, BlobBackend::Local);
        assert_eq!(config.storage.local_path, "data/blobs");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [storage]
            backend = "cos"

            [storage.cos]
            bucket = "files-1250000000"
            region = "ap-guangzhou"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, BlobBackend::Cos);
        assert_eq!(config.storage.cos.bucket, "files-1250000000");
        assert_eq!(config.storage.cos.request_timeout_secs, 60);
        assert_eq!(config.database.path, "data/hashvault.db");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HV_CONF_SERVER_PORT", "9000"),
            ("HV_CONF_STORAGE_BACKEND", "memory"),
            ("HV_CONF_COS_ENDPOINT", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, BlobBackend::Memory);
        assert!(config.storage.cos.endpoint.is_none());
    }

    #[test]
    fn test_unknown_backend_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == "HV_CONF_STORAGE_BACKEND").then(|| "minio".to_string())
        });
        assert_eq!(config.storage.backend, BlobBackend::Local);
    }

    #[test]
    fn test_cos_requires_credentials() {
        let mut config = Config::default();
        config.storage.backend = BlobBackend::Cos;
        assert!(config.validate().is_err());

        config.storage.cos.bucket = "b".to_string();
        config.storage.cos.secret_id = "id".to_string();
        config.storage.cos.secret_key = "key".to_string();
        config.storage.cos.region = "ap-guangzhou".to_string();
        assert!(config.validate().is_ok());
    }
}
