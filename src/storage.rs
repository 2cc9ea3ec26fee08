//! Remote object storage, as far as the content pipeline cares about it.
//!
//! Upload and delete belong to an external collaborator; this module only
//! answers "which public base URL should published images use", and only
//! when the storage is both enabled and fully configured.

use std::env;

use spdlog::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    R2,
    Oss,
}

impl StorageKind {
    fn parse(s: &str) -> Option<StorageKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r2" => Some(StorageKind::R2),
            "oss" => Some(StorageKind::Oss),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub public_url: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OssConfig {
    pub region: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket: String,
    pub base_url: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageConfig {
    pub enable: bool,
    pub kind: StorageKind,
    pub r2: R2Config,
    pub oss: OssConfig,
}

impl StorageConfig {
    pub fn from_env() -> StorageConfig {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing keys become
    /// empty strings; an unknown `STORAGE_TYPE` falls back to R2.
    pub fn from_lookup<F>(lookup: F) -> StorageConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let enable = matches!(get("STORAGE_ENABLE").to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        let kind = StorageKind::parse(&get("STORAGE_TYPE")).unwrap_or_default();

        StorageConfig {
            enable,
            kind,
            r2: R2Config {
                account_id: get("R2_ACCOUNT_ID"),
                access_key_id: get("R2_ACCESS_KEY_ID"),
                secret_access_key: get("R2_SECRET_ACCESS_KEY"),
                bucket: get("R2_BUCKET"),
                public_url: get("R2_PUBLIC_URL"),
            },
            oss: OssConfig {
                region: get("OSS_REGION"),
                access_key_id: get("OSS_ACCESS_KEY_ID"),
                access_key_secret: get("OSS_ACCESS_KEY_SECRET"),
                bucket: get("OSS_BUCKET"),
                base_url: get("OSS_BASE_URL"),
            },
        }
    }
}

/// Explicitly constructed storage handle, passed to whoever needs it.
#[derive(Clone, Debug, Default)]
pub struct StorageService {
    public_base_url: Option<String>,
}

impl StorageService {
    /// Validates the configuration once. An unusable configuration is not an
    /// error: the service simply stays unconfigured and images resolve to
    /// local paths.
    pub fn init(config: StorageConfig) -> StorageService {
        if !config.enable {
            return Self::disabled();
        }

        let base_url = match config.kind {
            StorageKind::R2 => {
                let r2 = &config.r2;
                if r2.account_id.is_empty() || r2.access_key_id.is_empty() || r2.secret_access_key.is_empty() {
                    warn!("R2 configuration is incomplete, falling back to local image paths");
                    return Self::disabled();
                }
                r2.public_url.as_str()
            }
            StorageKind::Oss => config.oss.base_url.as_str(),
        };

        if base_url.is_empty() {
            warn!("Storage is enabled but has no public base URL, falling back to local image paths");
            return Self::disabled();
        }

        StorageService {
            public_base_url: Some(base_url.trim_end_matches('/').to_string()),
        }
    }

    pub fn disabled() -> StorageService {
        StorageService { public_base_url: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.public_base_url.is_some()
    }

    /// Base URL without trailing slash, `None` when unconfigured.
    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}
