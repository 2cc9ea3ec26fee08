use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Rendered responses keyed by request, each with its own expiry.
pub struct ContentCache<T> {
    cache: Option<RwLock<CacheMap<T>>>,
}

type CacheMap<T> = HashMap<String, CacheValue<T>>;

#[derive(Copy, Clone, Debug)]
pub enum Expire {
    Never,
    After(Duration),
}

impl Expire {
    /// Seconds from configuration; negative means never.
    pub fn from_secs(secs: i64) -> Expire {
        if secs < 0 {
            Expire::Never
        } else {
            Expire::After(Duration::seconds(secs))
        }
    }
}

struct CacheValue<T> {
    expire_date: DateTime<Utc>,
    value: Arc<T>,
}

impl<T> ContentCache<T> {
    pub fn new() -> Self {
        ContentCache {
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    pub fn non_caching() -> Self {
        ContentCache { cache: None }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    pub fn add(&self, key: &str, content: T, expire_after: Expire) -> Arc<T> {
        let value = Arc::new(content);
        let Some(ref cache) = self.cache else {
            return value;
        };

        let expire_date = match expire_after {
            Expire::Never => DateTime::<Utc>::MAX_UTC,
            Expire::After(duration) => Utc::now() + duration,
        };

        let mut cache = cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Expired entries are only dropped when something new is stored
        let now = Utc::now();
        cache.retain(|_, v| v.expire_date >= now);
        cache.insert(key.to_string(), CacheValue {
            expire_date,
            value: value.clone(),
        });
        value
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let cache = self.cache.as_ref()?;
        let cache = cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let cache_value = cache.get(key)?;
        if Utc::now() > cache_value.expire_date {
            return None;
        }
        Some(cache_value.value.clone())
    }
}
