use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub stripe: StripeConfig,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public origin used when building absolute links (e.g. redirects).
    pub public_url: String,
    /// Directory holding `index.html`, `offline.html`, `sw.js` and `/static` assets.
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u64,
    #[serde(default = "default_refresh_expiry_days")]
    pub refresh_expiry_days: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2). Path-style addressing is used when set.
    pub endpoint: Option<String>,
    pub public_base_url: String,
    pub presigned_url_expiration_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub webhook_secret: String,
    /// Maximum accepted age of a signed webhook, in seconds.
    pub tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub expiry_sweep_secs: u64,
    pub manual_instructions: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_expiry_hours() -> u64 {
    24
}

fn default_refresh_expiry_days() -> u64 {
    30
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default("server.static_dir", "static")?
            .set_default("database.url", "postgres://localhost/studydocu")?
            .set_default("database.max_connections", 10)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("jwt.secret", "development-secret-change-in-production")?
            .set_default("jwt.expiry_hours", 24)?
            .set_default("jwt.refresh_expiry_days", 30)?
            .set_default("storage.backend", "s3")?
            .set_default("storage.bucket", "studydocu-documents")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.public_base_url", "http://localhost:8080/files")?
            .set_default("storage.presigned_url_expiration_secs", 900)?
            .set_default("storage.max_upload_bytes", 25 * 1024 * 1024)?
            .set_default("stripe.webhook_secret", "whsec_development")?
            .set_default("stripe.tolerance_secs", 300)?
            .set_default("payments.expiry_sweep_secs", 3600)?
            .set_default(
                "payments.manual_instructions",
                "Realiza la transferencia y envía el número de operación junto con tu comprobante.",
            )?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults() {
        let config = Config::load().expect("defaults should deserialize");
        assert_eq!(config.stripe.tolerance_secs, 300);
        assert_eq!(config.storage.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.jwt.refresh_expiry_days, 30);
    }
}
