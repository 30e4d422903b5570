//! Process-wide memory cache shared by every frame's fetcher.
//!
//! The fetch layer inserts; the loader only ever evicts.

use pd_net::ResourceResponse;
use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;
use url::Url;

/// Memory cache sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    pub capacity_bytes: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedResource {
    pub response: ResourceResponse,
    pub data: Vec<u8>,
    pub stored_at: Instant,
    pub max_age: Option<Duration>,
}

impl CachedResource {
    pub fn is_fresh(&self, now: Instant) -> bool {
        let Some(max_age) = self.max_age else {
            return false;
        };
        now.saturating_duration_since(self.stored_at) < max_age
    }
}

/// Keyed by URL without fragment.
#[derive(Debug, Default)]
pub struct MemoryCache {
    config: MemoryCacheConfig,
    entries: HashMap<String, CachedResource>,
    size_bytes: usize,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            size_bytes: 0,
        }
    }

    pub fn insert(&mut self, response: ResourceResponse, data: Vec<u8>, now: Instant) {
        if response
            .header("Cache-Control")
            .is_some_and(|value| contains_cache_directive(value, "no-store"))
        {
            return;
        }
        if data.len() > self.config.capacity_bytes {
            return;
        }

        let key = cache_key(&response.url);
        let max_age = response.header("Cache-Control").and_then(parse_max_age);
        self.remove_key(&key);
        self.size_bytes = self.size_bytes.saturating_add(data.len());
        self.entries.insert(
            key,
            CachedResource {
                response,
                data,
                stored_at: now,
                max_age,
            },
        );
        self.evict_oldest_until_within_capacity();
    }

    /// Appends body bytes to an entry inserted when its response arrived.
    pub fn append_data(&mut self, url: &Url, data: &[u8]) {
        let Some(entry) = self.entries.get_mut(&cache_key(url)) else {
            return;
        };
        entry.data.extend_from_slice(data);
        self.size_bytes = self.size_bytes.saturating_add(data.len());
        self.evict_oldest_until_within_capacity();
    }

    pub fn get(&self, url: &Url) -> Option<&CachedResource> {
        self.entries.get(&cache_key(url))
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.entries.contains_key(&cache_key(url))
    }

    /// Evicts `url`. Returns whether anything was cached for it.
    pub fn remove(&mut self, url: &Url) -> bool {
        self.remove_key(&cache_key(url))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    fn remove_key(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.size_bytes = self.size_bytes.saturating_sub(entry.data.len());
                true
            }
            None => false,
        }
    }

    fn evict_oldest_until_within_capacity(&mut self) {
        while self.size_bytes > self.config.capacity_bytes {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.remove_key(&oldest);
        }
    }
}

fn cache_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

fn contains_cache_directive(value: &str, directive: &str) -> bool {
    value
        .split(',')
        .map(str::trim)
        .any(|token| token.eq_ignore_ascii_case(directive))
}

fn parse_max_age(cache_control: &str) -> Option<Duration> {
    for directive in cache_control.split(',').map(str::trim) {
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };

        if !name.trim().eq_ignore_ascii_case("max-age") {
            continue;
        }

        let trimmed = value.trim().trim_matches('"');
        if let Ok(seconds) = trimmed.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::MemoryCache;
    use super::MemoryCacheConfig;
    use pd_net::HeaderMap;
    use pd_net::HttpStatusCode;
    use pd_net::ResourceResponse;
    use std::time::Duration;
    use std::time::Instant;
    use url::Url;

    fn response(input: &str, cache_control: Option<&str>) -> ResourceResponse {
        let url = match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let mut headers = HeaderMap::new();
        if let Some(value) = cache_control {
            assert!(headers.set("Cache-Control", value).is_ok());
        }
        ResourceResponse::http(url, HttpStatusCode::OK, headers)
    }

    #[test]
    fn eviction_ignores_fragment() {
        let mut cache = MemoryCache::new(MemoryCacheConfig::default());
        let now = Instant::now();
        cache.insert(response("https://a.example/x", None), b"abc".to_vec(), now);
        assert_eq!(cache.size_bytes(), 3);

        let lookup = match Url::parse("https://a.example/x#frag") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(cache.contains(&lookup));
        assert!(cache.remove(&lookup));
        assert!(!cache.remove(&lookup));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn no_store_responses_are_not_cached() {
        let mut cache = MemoryCache::new(MemoryCacheConfig::default());
        cache.insert(
            response("https://a.example/private", Some("private, no-store")),
            Vec::new(),
            Instant::now(),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn freshness_follows_max_age() {
        let mut cache = MemoryCache::new(MemoryCacheConfig::default());
        let now = Instant::now();
        let page = response("https://a.example/p", Some("max-age=60"));
        let url = page.url.clone();
        cache.insert(page, b"p".to_vec(), now);

        let entry = cache.get(&url);
        assert!(entry.is_some_and(|entry| entry.is_fresh(now + Duration::from_secs(30))));
        assert!(!cache
            .get(&url)
            .is_some_and(|entry| entry.is_fresh(now + Duration::from_secs(61))));
    }

    #[test]
    fn streamed_body_is_accounted() {
        let mut cache = MemoryCache::new(MemoryCacheConfig::default());
        let page = response("https://a.example/stream", None);
        let url = page.url.clone();
        cache.insert(page, Vec::new(), Instant::now());
        cache.append_data(&url, b"hello");
        cache.append_data(&url, b" world");
        assert_eq!(cache.get(&url).map(|entry| entry.data.len()), Some(11));
        assert_eq!(cache.size_bytes(), 11);
    }

    #[test]
    fn capacity_evicts_oldest_entries() {
        let mut cache = MemoryCache::new(MemoryCacheConfig { capacity_bytes: 4 });
        let now = Instant::now();
        cache.insert(response("https://a.example/1", None), vec![0; 3], now);
        cache.insert(
            response("https://a.example/2", None),
            vec![0; 3],
            now + Duration::from_secs(1),
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 3);
    }
}
