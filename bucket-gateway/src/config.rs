//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `GATEWAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `GATEWAY_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `GATEWAY_STORAGE__BUCKET=uploads` sets the `storage.bucket` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use bucket_gateway::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Gateway will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`, `max_body_size`
//! - **Storage**: `storage.type` (`s3` or `memory`), `storage.bucket`, plus S3 connection
//!   settings (`region`, `endpoint_url`, `access_key_id`, `secret_access_key`, `force_path_style`)
//! - **Presigning**: `presign.upload_expiry`, `presign.default_expiry`, `presign.upload_acl`
//! - **CORS**: `cors.allowed_origins`, `cors.max_age`
//! - **Telemetry**: `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! GATEWAY_PORT=8080
//!
//! # Point at an S3-compatible service
//! GATEWAY_STORAGE__TYPE=s3
//! GATEWAY_STORAGE__BUCKET=uploads
//! GATEWAY_STORAGE__ENDPOINT_URL=http://localhost:9000
//! GATEWAY_STORAGE__FORCE_PATH_STYLE=true
//!
//! # Shorten upload URLs
//! GATEWAY_PRESIGN__UPLOAD_EXPIRY=2m
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use crate::storage::ObjectAcl;

/// Longest lifetime SigV4 allows for a presigned URL
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "GATEWAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,
    /// Object storage backend
    pub storage: StorageConfig,
    /// Presigned URL settings
    pub presign: PresignConfig,
    /// Cross-origin settings for browser clients
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// AWS S3 or an S3-compatible service
    S3(S3StorageConfig),
    /// Process-local bucket, lost on restart
    Memory(MemoryStorageConfig),
}

impl StorageConfig {
    pub fn bucket(&self) -> &str {
        match self {
            StorageConfig::S3(config) => &config.bucket,
            StorageConfig::Memory(config) => &config.bucket,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct S3StorageConfig {
    /// Bucket all keys live in
    pub bucket: String,
    /// Region; falls back to the AWS environment/profile when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
    /// Static access key. When unset, the default AWS credential chain is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    #[serde(default)]
    pub force_path_style: bool,
}

// The secret never reaches logs, even at debug level
impl std::fmt::Debug for S3StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryStorageConfig {
    #[serde(default = "default_memory_bucket")]
    pub bucket: String,
}

fn default_memory_bucket() -> String {
    "local".to_string()
}

/// Presigned URL configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresignConfig {
    /// Lifetime of upload URLs handed out for POST/PUT requests (default: 5m)
    #[serde(with = "humantime_serde")]
    pub upload_expiry: Duration,
    /// Lifetime used when a request does not override it (default: 15m)
    #[serde(with = "humantime_serde")]
    pub default_expiry: Duration,
    /// Canned ACL signed into upload URLs (default: public-read, `null` for none)
    pub upload_acl: Option<ObjectAcl>,
}

/// CORS configuration. No CORS layer is installed while `allowed_origins` is empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// An allowed CORS origin.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_size: 64 * 1024,
            storage: StorageConfig::default(),
            presign: PresignConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(MemoryStorageConfig {
            bucket: default_memory_bucket(),
        })
    }
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            upload_expiry: Duration::from_secs(5 * 60),
            default_expiry: Duration::from_secs(15 * 60),
            upload_acl: Some(ObjectAcl::PublicRead),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // GATEWAY_CONFIG names the file itself, it is not a config value
            .merge(Env::prefixed("GATEWAY_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.storage.bucket().trim().is_empty() {
            return Err(Error::Internal {
                operation: "validate config: storage.bucket must not be empty".to_string(),
            });
        }

        if let StorageConfig::S3(s3) = &self.storage
            && s3.access_key_id.is_some() != s3.secret_access_key.is_some()
        {
            return Err(Error::Internal {
                operation: "validate config: storage.access_key_id and storage.secret_access_key must be set together".to_string(),
            });
        }

        for (name, expiry) in [
            ("presign.upload_expiry", self.presign.upload_expiry),
            ("presign.default_expiry", self.presign.default_expiry),
        ] {
            if expiry.is_zero() || expiry > MAX_PRESIGN_EXPIRY {
                return Err(Error::Internal {
                    operation: format!(
                        "validate config: {name} must be greater than zero and at most 7 days (got {})",
                        humantime::format_duration(expiry)
                    ),
                });
            }
        }

        if self.max_body_size == 0 {
            return Err(Error::Internal {
                operation: "validate config: max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&Args {
                config: "missing.yaml".to_string(),
                validate: false,
            })?;

            assert_eq!(config.port, 3000);
            assert!(matches!(config.storage, StorageConfig::Memory(_)));
            assert_eq!(config.storage.bucket(), "local");
            assert_eq!(config.presign.upload_expiry, Duration::from_secs(300));
            assert_eq!(config.presign.upload_acl, Some(ObjectAcl::PublicRead));
            assert!(config.cors.allowed_origins.is_empty());

            Ok(())
        });
    }

    #[test]
    fn test_s3_storage_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  type: s3
  bucket: uploads
  region: eu-central-1
  endpoint_url: http://localhost:9000
  access_key_id: minio
  secret_access_key: minio-secret
  force_path_style: true
presign:
  upload_expiry: 2m
  upload_acl: private
"#,
            )?;

            let config = Config::load(&args())?;

            let StorageConfig::S3(s3) = &config.storage else {
                panic!("expected s3 storage, got {:?}", config.storage);
            };
            assert_eq!(s3.bucket, "uploads");
            assert_eq!(s3.region.as_deref(), Some("eu-central-1"));
            assert_eq!(s3.endpoint_url.as_ref().map(Url::as_str), Some("http://localhost:9000/"));
            assert_eq!(s3.access_key_id.as_deref(), Some("minio"));
            assert!(s3.force_path_style);

            assert_eq!(config.presign.upload_expiry, Duration::from_secs(120));
            assert_eq!(config.presign.default_expiry, Duration::from_secs(900)); // still default
            assert_eq!(config.presign.upload_acl, Some(ObjectAcl::Private));

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  type: s3
  bucket: from-yaml
cors:
  allowed_origins:
    - "*"
    - https://app.example.com
"#,
            )?;

            jail.set_env("GATEWAY_HOST", "127.0.0.1");
            jail.set_env("GATEWAY_PORT", "8080");
            jail.set_env("GATEWAY_STORAGE__BUCKET", "from-env");

            let config = Config::load(&args())?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.storage.bucket(), "from-env");

            // YAML values should be preserved
            assert_eq!(config.cors.allowed_origins.len(), 2);
            assert!(matches!(config.cors.allowed_origins[0], CorsOrigin::Wildcard));
            assert!(matches!(config.cors.allowed_origins[1], CorsOrigin::Url(_)));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "buckett: typo\n")?;

            assert!(Config::load(&args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let config = S3StorageConfig {
            bucket: "uploads".to_string(),
            region: None,
            endpoint_url: None,
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio-secret".to_string()),
            force_path_style: false,
        };

        let output = format!("{config:?}");
        assert!(output.contains("minio"));
        assert!(!output.contains("minio-secret"));
    }

    #[test]
    fn test_config_validation_empty_bucket() {
        let config = Config {
            storage: StorageConfig::Memory(MemoryStorageConfig { bucket: " ".to_string() }),
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("storage.bucket"));
    }

    #[test]
    fn test_config_validation_half_static_credentials() {
        let config = Config {
            storage: StorageConfig::S3(S3StorageConfig {
                bucket: "uploads".to_string(),
                region: None,
                endpoint_url: None,
                access_key_id: Some("key".to_string()),
                secret_access_key: None,
                force_path_style: false,
            }),
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("must be set together"));
    }

    #[test]
    fn test_config_validation_expiry_bounds() {
        let mut config = Config::default();
        config.presign.upload_expiry = Duration::ZERO;
        assert!(config.validate().unwrap_err().to_string().contains("presign.upload_expiry"));

        let mut config = Config::default();
        config.presign.default_expiry = MAX_PRESIGN_EXPIRY + Duration::from_secs(1);
        assert!(config.validate().unwrap_err().to_string().contains("presign.default_expiry"));

        let mut config = Config::default();
        config.presign.default_expiry = MAX_PRESIGN_EXPIRY;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_body_size() {
        let config = Config {
            max_body_size: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("max_body_size"));
    }

    #[test]
    fn test_config_validation_valid_config() {
        assert!(Config::default().validate().is_ok());
    }
}
