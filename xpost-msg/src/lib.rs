// Wire shapes shared with the search backend and the pin service.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, VecSkipError};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;
use xpost_ref::{HandleRef, ProfileRef, RefError};

#[derive(Clone, Debug, ThisError)]
#[error("Unknown network: {0}")]
pub struct UnknownNetwork(String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Network {
    #[serde(alias = "a")]
    NetworkA,
    #[serde(alias = "b")]
    NetworkB,
}

impl Network {
    pub fn other(self) -> Network {
        match self {
            Network::NetworkA => Network::NetworkB,
            Network::NetworkB => Network::NetworkA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::NetworkA => "networkA",
            Network::NetworkB => "networkB",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" | "networka" => Ok(Network::NetworkA),
            "b" | "networkb" => Ok(Network::NetworkB),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

/// Upstream sources that feed a streamed search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Pins,
    Profiles(Network),
    Other(String),
}

impl Source {
    pub const PINS: &'static str = "pins";
    pub const CROSS_MAPPINGS: &'static str = "crossMappings";

    pub fn as_str(&self) -> &str {
        match self {
            Source::Pins => Self::PINS,
            Source::Profiles(network) => network.as_str(),
            Source::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        if value == Self::PINS {
            Source::Pins
        } else if let Ok(network) = value.parse() {
            Source::Profiles(network)
        } else {
            Source::Other(value.to_string())
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinStatus {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub is_pinned: bool,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub pin_id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub is_personal_pin: Option<bool>,
}

impl PinStatus {
    /// Carries over pin metadata that `self` does not know about.
    pub fn inherit(&mut self, earlier: &PinStatus) {
        self.is_pinned |= earlier.is_pinned;
        if self.pin_id.is_none() {
            self.pin_id = earlier.pin_id.clone();
        }
        if self.is_personal_pin.is_none() {
            self.is_personal_pin = earlier.is_personal_pin;
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossPlatformMapping {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, alias = "hasMapping")]
    pub linked: bool,
    // Network A username, without @
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub handle: Option<String>,
    // Network B hex public key
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub display_name: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAProfile {
    pub id: String,
    pub username: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(flatten)]
    pub pin: PinStatus,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub cross_platform_mapping: Option<CrossPlatformMapping>,
}

impl NetworkAProfile {
    pub fn handle(&self) -> Result<HandleRef, RefError> {
        HandleRef::from_string(self.username.clone())
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBProfile {
    pub pubkey: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub npub: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub nip05: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub pin: PinStatus,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub cross_platform_mapping: Option<CrossPlatformMapping>,
}

impl NetworkBProfile {
    pub fn token(&self) -> Result<ProfileRef, RefError> {
        match &self.npub {
            Some(npub) => ProfileRef::from_string(npub.clone()),
            None => ProfileRef::from_pubkey(&self.pubkey),
        }
    }

    /// Human name, falling back to a shortened key.
    pub fn label(&self) -> String {
        let named = [&self.display_name, &self.name]
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .find(|name| !name.is_empty());
        match named {
            Some(name) => name.to_string(),
            None => {
                let key = self.npub.as_deref().unwrap_or(self.pubkey.as_str());
                key.chars().take(12).collect()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "network", rename_all = "camelCase")]
pub enum SearchResult {
    NetworkA(NetworkAProfile),
    NetworkB(NetworkBProfile),
}

impl SearchResult {
    pub fn network(&self) -> Network {
        match self {
            SearchResult::NetworkA(_) => Network::NetworkA,
            SearchResult::NetworkB(_) => Network::NetworkB,
        }
    }

    /// Username for Network A, public key for Network B.
    pub fn identifier(&self) -> &str {
        match self {
            SearchResult::NetworkA(profile) => profile.username.as_str(),
            SearchResult::NetworkB(profile) => profile.pubkey.as_str(),
        }
    }

    /// Case-insensitive identity used to merge results across sources.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.network(), self.identifier().to_lowercase())
    }

    /// The name a marker shows for this profile on its own network.
    pub fn display_name(&self) -> String {
        match self {
            SearchResult::NetworkA(profile) => profile.username.trim_start_matches('@').to_string(),
            SearchResult::NetworkB(profile) => profile.label(),
        }
    }

    pub fn pin(&self) -> &PinStatus {
        match self {
            SearchResult::NetworkA(profile) => &profile.pin,
            SearchResult::NetworkB(profile) => &profile.pin,
        }
    }

    pub fn pin_mut(&mut self) -> &mut PinStatus {
        match self {
            SearchResult::NetworkA(profile) => &mut profile.pin,
            SearchResult::NetworkB(profile) => &mut profile.pin,
        }
    }

    pub fn mapping(&self) -> Option<&CrossPlatformMapping> {
        match self {
            SearchResult::NetworkA(profile) => profile.cross_platform_mapping.as_ref(),
            SearchResult::NetworkB(profile) => profile.cross_platform_mapping.as_ref(),
        }
    }

    pub fn mapping_mut(&mut self) -> &mut Option<CrossPlatformMapping> {
        match self {
            SearchResult::NetworkA(profile) => &mut profile.cross_platform_mapping,
            SearchResult::NetworkB(profile) => &mut profile.cross_platform_mapping,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.mapping().map(|mapping| mapping.linked).unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameType {
    Partial,
    Complete,
    Error,
}

/// One server-sent event of a streamed search.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde_as(deserialize_as = "VecSkipError<_>")]
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub completed_sources: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub networks: Vec<Network>,
    pub include_personal_pins: bool,
    pub include_cross_platform_mappings: bool,
    pub limit: u32,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct BatchResponse {
    #[serde_as(deserialize_as = "VecSkipError<_>")]
    #[serde(default)]
    pub results: Vec<SearchResult>,
}
