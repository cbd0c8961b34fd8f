use serde::{Deserialize, Serialize};
use std::time::Duration;
use xpost_msg::{Network, SearchRequest};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub stream_path: String,
    pub batch_path: String,
    pub limit: u32,
    pub include_personal_pins: bool,
    pub include_cross_platform_mappings: bool,
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            stream_path: "/api/search/stream".to_string(),
            batch_path: "/api/search".to_string(),
            limit: 20,
            include_personal_pins: true,
            include_cross_platform_mappings: true,
            debounce_ms: 300,
        }
    }
}

impl SearchConfig {
    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    pub fn batch_url(&self) -> String {
        join_url(&self.base_url, &self.batch_path)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request(&self, query: &str, networks: &[Network]) -> SearchRequest {
        SearchRequest {
            query: query.trim().to_string(),
            networks: networks.to_vec(),
            include_personal_pins: self.include_personal_pins,
            include_cross_platform_mappings: self.include_cross_platform_mappings,
            limit: self.limit,
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
