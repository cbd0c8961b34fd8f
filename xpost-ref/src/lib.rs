use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error as ThisError;

mod bech32;
pub use bech32::{encode, encode_bare, EncodingError};

/// Namespace used in front of a Network B profile key, e.g. `nostr:npub1…`.
pub const TOKEN_NAMESPACE: &str = "nostr";
pub const PROFILE_PREFIX: &str = "npub";
pub const EVENT_PREFIX: &str = "nevent";

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
    #[error("Failed to encode identifier, cause: {0}")]
    Encoding(#[from] EncodingError),
}

/// Network A posting handle, `@username`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HandleRef(String);

impl HandleRef {
    // From string that starts with @, or a bare username
    pub fn from_string(string: String) -> Result<Self, RefError> {
        let normalized = if string.starts_with('@') {
            string
        } else {
            format!("@{}", string)
        };
        if !Self::is_match(normalized.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Handle",
                input: normalized,
            })
        } else {
            Ok(Self(normalized))
        }
    }

    pub fn to_string(&self) -> String {
        self.0.clone()
    }

    /// Username without the leading `@`.
    pub fn username(&self) -> &str {
        &self.0[1..]
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", HANDLE_RE)).unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for HandleRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HandleRef::from_string(value)
    }
}

impl From<HandleRef> for String {
    fn from(value: HandleRef) -> String {
        value.0
    }
}

/// Network B posting token, `nostr:npub1…`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileRef(String);

impl ProfileRef {
    // From string that starts with nostr:npub1, or a bare npub1
    pub fn from_string(string: String) -> Result<Self, RefError> {
        let normalized = if string.starts_with(PROFILE_PREFIX) {
            format!("{}:{}", TOKEN_NAMESPACE, string)
        } else {
            string
        };
        if !Self::is_match(normalized.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Profile",
                input: normalized,
            })
        } else {
            Ok(Self(normalized))
        }
    }

    /// Builds the token from a hex public key.
    pub fn from_pubkey(pubkey: &str) -> Result<Self, RefError> {
        let npub = encode_bare(PROFILE_PREFIX, pubkey)?;
        Ok(Self(format!("{}:{}", TOKEN_NAMESPACE, npub)))
    }

    pub fn to_string(&self) -> String {
        self.0.clone()
    }

    /// The `npub1…` part without the namespace.
    pub fn npub(&self) -> &str {
        &self.0[TOKEN_NAMESPACE.len() + 1..]
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", PROFILE_RE)).unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for ProfileRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProfileRef::from_string(value)
    }
}

impl From<ProfileRef> for String {
    fn from(value: ProfileRef) -> String {
        value.0
    }
}

/// Raw 32-byte event identifier, lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventRef(String);

impl EventRef {
    pub fn from_string(string: String) -> Result<Self, RefError> {
        let lowered = string.to_lowercase();
        if !Self::is_match(lowered.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Event",
                input: string,
            })
        } else {
            Ok(Self(lowered))
        }
    }

    pub fn to_string(&self) -> String {
        self.0.clone()
    }

    /// Share-link token for this event.
    pub fn to_nevent(&self) -> Result<String, RefError> {
        Ok(encode(EVENT_PREFIX, &self.0)?)
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", HEX_ID_RE)).unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for EventRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventRef::from_string(value)
    }
}

impl From<EventRef> for String {
    fn from(value: EventRef) -> String {
        value.0
    }
}

/// True when a search query is an opaque profile identifier rather than a name:
/// a bare or namespaced `npub1…`, or a 64 character hex key.
pub fn is_raw_identifier(query: &str) -> bool {
    lazy_static! {
        static ref RE: Regex = Regex::new(&format!(
            "^(({}:)?{}|{})$",
            TOKEN_NAMESPACE, NPUB_RE, HEX_ID_RE
        ))
        .unwrap();
    }
    RE.is_match(query.trim())
}

const HANDLE_RE: &str = "@[A-Za-z0-9_]{1,15}";
const NPUB_RE: &str = "npub1[02-9ac-hj-np-z]{58}";
const PROFILE_RE: &str = "nostr:npub1[02-9ac-hj-np-z]{58}";
const HEX_ID_RE: &str = "[0-9a-fA-F]{64}";

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";
    const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";

    #[test]
    fn test_is_handle() {
        assert!(HandleRef::is_match("@alice"));
        assert!(HandleRef::is_match("@alice_w99"));
        assert!(!HandleRef::is_match("@"));
        assert!(!HandleRef::is_match("@alice.w"));
        assert!(!HandleRef::is_match("@abcdefghijklmnop"));
    }

    #[test]
    fn test_handle_from_bare_username() {
        let handle = HandleRef::from_string("alice".to_string()).unwrap();
        assert_eq!(handle.to_string(), "@alice");
        assert_eq!(handle.username(), "alice");
    }

    #[test]
    fn test_profile_from_pubkey() {
        let profile = ProfileRef::from_pubkey(PUBKEY).unwrap();
        assert_eq!(profile.to_string(), format!("nostr:{}", NPUB));
        assert_eq!(profile.npub(), NPUB);
    }

    #[test]
    fn test_profile_from_bare_npub() {
        let profile = ProfileRef::from_string(NPUB.to_string()).unwrap();
        assert_eq!(profile.to_string(), format!("nostr:{}", NPUB));
        assert!(ProfileRef::from_string("nostr:npub1short".to_string()).is_err());
    }

    #[test]
    fn test_event_to_nevent() {
        let event = EventRef::from_string(
            "B9F5441E45CA39179320E0031CFB18E34078673DCC3D3E3A3B3A981760AA5696".to_string(),
        )
        .unwrap();
        assert_eq!(
            event.to_nevent().unwrap(),
            "nevent1qqstna2yrezu5wghjvswqqculvvwxsrcvu7uc0f78gan4xqhvz49d9s5p05vw"
        );
    }

    #[test]
    fn test_is_raw_identifier() {
        assert!(is_raw_identifier(NPUB));
        assert!(is_raw_identifier(&format!("nostr:{}", NPUB)));
        assert!(is_raw_identifier(PUBKEY));
        assert!(!is_raw_identifier("alice"));
        assert!(!is_raw_identifier("npub1"));
    }

    #[test]
    fn test_serde_rejects_bad_handle() {
        let result: Result<HandleRef, _> = serde_json::from_str("\"@not a handle\"");
        assert!(result.is_err());
    }
}
