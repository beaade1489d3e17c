//! Redis cache integration
//!
//! Provides:
//! - A shared multiplexed connection
//! - Generic get/set operations with TTL
//! - Search response caching keyed by a request fingerprint

use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Redis cache client
#[derive(Clone)]
pub struct Cache {
    connection: MultiplexedConnection,
    ttl_secs: u64,
    key_prefix: String,
}

impl Cache {
    /// Connect when a URL is configured; `Ok(None)` means caching is off
    pub async fn from_config(config: &CacheConfig) -> Result<Option<Self>> {
        let Some(url) = config.url.as_deref() else {
            return Ok(None);
        };

        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Some(Self {
            connection,
            ttl_secs: config.ttl_secs,
            key_prefix: config.key_prefix.clone(),
        }))
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value in cache with the configured TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let full_key = self.key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&full_key, &json, self.ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs = self.ttl_secs, "Cache set");
        Ok(())
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    use crate::errors::Result;
    use serde::Serialize;
    use sha2::{Digest, Sha256};

    /// Stable SHA-256 fingerprint of a serializable request
    pub fn fingerprint<T: Serialize>(value: &T) -> Result<String> {
        let bytes = serde_json::to_vec(value)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Build a search response cache key
    pub fn search_response(fingerprint: &str) -> String {
        format!("search:{}", fingerprint)
    }
}
