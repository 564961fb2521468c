use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::vault::form::ResumeUrlStrategy;
use crate::vault::picker::{AcceptList, DEFAULT_MAX_UPLOAD_BYTES};

const DEFAULT_PLACEHOLDER_BASE: &str = "https://files.resume-vault.local/resumes";

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_public_base_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
    pub bucket: String,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Postgres(PostgresConfig),
    Rest(RestConfig),
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable required by the selected store backend is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub accepted_file_types: AcceptList,
    pub max_upload_bytes: u64,
    pub resume_url_strategy: ResumeUrlStrategy,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let backend = match or_default("STORE_BACKEND", "postgres").as_str() {
            "postgres" => {
                let s3_bucket = require("S3_BUCKET")?;
                let s3_endpoint = require("S3_ENDPOINT")?;
                let s3_public_base_url = lookup("S3_PUBLIC_BASE_URL").unwrap_or_else(|| {
                    format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket)
                });
                StoreBackend::Postgres(PostgresConfig {
                    database_url: require("DATABASE_URL")?,
                    s3_region: or_default("S3_REGION", "us-east-1"),
                    aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
                    aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
                    s3_bucket,
                    s3_endpoint,
                    s3_public_base_url,
                })
            }
            "rest" => StoreBackend::Rest(RestConfig {
                url: require("REMOTE_STORE_URL")?,
                api_key: require("REMOTE_STORE_KEY")?,
                bucket: or_default("REMOTE_STORE_BUCKET", "resumes"),
                poll_interval: Duration::from_secs(
                    or_default("REMOTE_STORE_POLL_SECS", "5")
                        .parse::<u64>()
                        .context("REMOTE_STORE_POLL_SECS must be a whole number of seconds")?
                        .max(1),
                ),
            }),
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be one of postgres, rest, memory (got '{other}')"),
        };

        let resume_url_strategy = match or_default("RESUME_URL_STRATEGY", "upload").as_str() {
            "upload" => ResumeUrlStrategy::Upload,
            "placeholder" => ResumeUrlStrategy::Placeholder {
                base: or_default("RESUME_PLACEHOLDER_BASE", DEFAULT_PLACEHOLDER_BASE),
            },
            other => bail!("RESUME_URL_STRATEGY must be 'upload' or 'placeholder' (got '{other}')"),
        };

        let accepted_file_types = AcceptList::parse(&or_default("ACCEPTED_FILE_TYPES", ".pdf"));
        if accepted_file_types.entries().is_empty() {
            bail!("ACCEPTED_FILE_TYPES must list at least one type");
        }

        Ok(Config {
            backend,
            accepted_file_types,
            max_upload_bytes: or_default("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())
                .parse::<u64>()
                .context("MAX_UPLOAD_BYTES must be a number of bytes")?,
            resume_url_strategy,
            port: or_default("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or_default("RUST_LOG", "info"),
        })
    }
}
