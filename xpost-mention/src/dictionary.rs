use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use xpost_msg::Network;
use xpost_ref::{HandleRef, ProfileRef};

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EntryError {
    #[error("Mention entry with scope {scope:?} is missing its {field}")]
    MissingField {
        scope: MentionScope,
        field: &'static str,
    },
    #[error("Mention entry with scope {scope:?} must not carry a {field}")]
    UnexpectedField {
        scope: MentionScope,
        field: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MentionScope {
    NetworkAOnly,
    NetworkBOnly,
    Both,
}

impl MentionScope {
    pub fn single(network: Network) -> Self {
        match network {
            Network::NetworkA => MentionScope::NetworkAOnly,
            Network::NetworkB => MentionScope::NetworkBOnly,
        }
    }

    /// True when a mention with this scope is live on `network`.
    pub fn covers(self, network: Network) -> bool {
        matches!(
            (self, network),
            (MentionScope::Both, _)
                | (MentionScope::NetworkAOnly, Network::NetworkA)
                | (MentionScope::NetworkBOnly, Network::NetworkB)
        )
    }
}

/// One resolved mention. Only built through the scope constructors, so
/// the fields always agree with the scope.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", try_from = "RawMentionEntry")]
pub struct MentionEntry {
    network_a_handle: Option<String>,
    network_b_token: Option<String>,
    network_b_display_name: Option<String>,
    scope: MentionScope,
}

impl MentionEntry {
    pub fn network_a(handle: &HandleRef) -> Self {
        Self {
            network_a_handle: Some(handle.to_string()),
            network_b_token: None,
            network_b_display_name: None,
            scope: MentionScope::NetworkAOnly,
        }
    }

    pub fn network_b(token: &ProfileRef, display_name: Option<String>) -> Self {
        Self {
            network_a_handle: None,
            network_b_token: Some(token.to_string()),
            network_b_display_name: display_name,
            scope: MentionScope::NetworkBOnly,
        }
    }

    pub fn both(handle: &HandleRef, token: &ProfileRef, display_name: Option<String>) -> Self {
        Self {
            network_a_handle: Some(handle.to_string()),
            network_b_token: Some(token.to_string()),
            network_b_display_name: display_name,
            scope: MentionScope::Both,
        }
    }

    pub fn scope(&self) -> MentionScope {
        self.scope
    }

    /// `@username`, when the mention exists on Network A.
    pub fn network_a_handle(&self) -> Option<&str> {
        self.network_a_handle.as_deref()
    }

    pub fn network_b_token(&self) -> Option<&str> {
        self.network_b_token.as_deref()
    }

    pub fn network_b_display_name(&self) -> Option<&str> {
        self.network_b_display_name.as_deref()
    }

    /// The posting token for `network`, if the mention is live there.
    pub fn token_for(&self, network: Network) -> Option<&str> {
        if !self.scope.covers(network) {
            return None;
        }
        match network {
            Network::NetworkA => self.network_a_handle(),
            Network::NetworkB => self.network_b_token(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMentionEntry {
    #[serde(default)]
    network_a_handle: Option<String>,
    #[serde(default)]
    network_b_token: Option<String>,
    #[serde(default)]
    network_b_display_name: Option<String>,
    scope: MentionScope,
}

impl TryFrom<RawMentionEntry> for MentionEntry {
    type Error = EntryError;

    fn try_from(raw: RawMentionEntry) -> Result<Self, Self::Error> {
        let scope = raw.scope;
        let wants_handle = scope.covers(Network::NetworkA);
        let wants_token = scope.covers(Network::NetworkB);

        match (wants_handle, raw.network_a_handle.is_some()) {
            (true, false) => {
                return Err(EntryError::MissingField {
                    scope,
                    field: "networkAHandle",
                })
            }
            (false, true) => {
                return Err(EntryError::UnexpectedField {
                    scope,
                    field: "networkAHandle",
                })
            }
            _ => {}
        }
        match (wants_token, raw.network_b_token.is_some()) {
            (true, false) => {
                return Err(EntryError::MissingField {
                    scope,
                    field: "networkBToken",
                })
            }
            (false, true) => {
                return Err(EntryError::UnexpectedField {
                    scope,
                    field: "networkBToken",
                })
            }
            _ => {}
        }

        Ok(MentionEntry {
            network_a_handle: raw.network_a_handle,
            network_b_token: raw.network_b_token,
            network_b_display_name: raw.network_b_display_name,
            scope,
        })
    }
}

/// Network B token back to the display name that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ReverseTokenIndex(BTreeMap<String, String>);

impl ReverseTokenIndex {
    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, token: String, display_name: String) {
        self.0.insert(token, display_name);
    }
}

/// Mentions resolved during one compose session, keyed by the display
/// string a marker shows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "DictionaryRecord", into = "DictionaryRecord")]
pub struct MentionDictionary {
    entries: BTreeMap<String, MentionEntry>,
    reverse: ReverseTokenIndex,
}

impl MentionDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or supersedes the entry under `key`. A `Both` entry also
    /// registers its Network B token in the reverse index.
    pub fn upsert(&mut self, key: impl Into<String>, entry: MentionEntry) {
        let key = key.into();
        if entry.scope == MentionScope::Both {
            if let Some(token) = &entry.network_b_token {
                let display_name = entry
                    .network_b_display_name
                    .clone()
                    .unwrap_or_else(|| key.clone());
                self.reverse.insert(token.clone(), display_name);
            }
        }
        trace!("upsert mention {:?} with scope {:?}", key, entry.scope);
        self.entries.insert(key, entry);
    }

    pub fn get(&self, key: &str) -> Option<&MentionEntry> {
        self.entries.get(key)
    }

    /// Every entry, ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MentionEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reverse_index(&self) -> &ReverseTokenIndex {
        &self.reverse
    }

    pub fn display_for_token(&self, token: &str) -> Option<&str> {
        self.reverse.get(token)
    }
}

#[derive(Clone, Deserialize, Serialize)]
struct DictionaryRecord {
    entries: BTreeMap<String, MentionEntry>,
    #[serde(default)]
    reverse: ReverseTokenIndex,
}

impl From<DictionaryRecord> for MentionDictionary {
    fn from(record: DictionaryRecord) -> Self {
        let mut dictionary = MentionDictionary {
            entries: BTreeMap::new(),
            reverse: record.reverse,
        };
        for (key, entry) in record.entries {
            // keep stored reverse names, only fill gaps
            let indexed = entry.scope == MentionScope::Both
                && entry
                    .network_b_token
                    .as_deref()
                    .map(|token| dictionary.reverse.contains(token))
                    .unwrap_or(false);
            if indexed {
                dictionary.entries.insert(key, entry);
            } else {
                dictionary.upsert(key, entry);
            }
        }
        dictionary
    }
}

impl From<MentionDictionary> for DictionaryRecord {
    fn from(dictionary: MentionDictionary) -> Self {
        DictionaryRecord {
            entries: dictionary.entries,
            reverse: dictionary.reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    fn alice_handle() -> HandleRef {
        HandleRef::from_string("alice".to_string()).unwrap()
    }

    fn alice_token() -> ProfileRef {
        ProfileRef::from_pubkey(PUBKEY).unwrap()
    }

    #[test]
    fn test_scope_covers() {
        assert!(MentionScope::Both.covers(Network::NetworkA));
        assert!(MentionScope::Both.covers(Network::NetworkB));
        assert!(MentionScope::NetworkAOnly.covers(Network::NetworkA));
        assert!(!MentionScope::NetworkAOnly.covers(Network::NetworkB));
        assert_eq!(
            MentionScope::single(Network::NetworkB),
            MentionScope::NetworkBOnly
        );
    }

    #[test]
    fn test_token_for() {
        let entry = MentionEntry::network_a(&alice_handle());
        assert_eq!(entry.token_for(Network::NetworkA), Some("@alice"));
        assert_eq!(entry.token_for(Network::NetworkB), None);

        let entry = MentionEntry::both(&alice_handle(), &alice_token(), None);
        assert_eq!(
            entry.token_for(Network::NetworkB),
            Some(alice_token().to_string().as_str())
        );
    }

    #[test]
    fn test_upsert_both_fills_reverse_index() {
        let mut dictionary = MentionDictionary::new();
        dictionary.upsert(
            "alice",
            MentionEntry::both(
                &alice_handle(),
                &alice_token(),
                Some("Alice W.".to_string()),
            ),
        );

        let token = alice_token().to_string();
        assert_eq!(dictionary.display_for_token(&token), Some("Alice W."));
        for (_, entry) in dictionary.entries() {
            if entry.scope() == MentionScope::Both {
                assert!(dictionary
                    .reverse_index()
                    .contains(entry.network_b_token().unwrap()));
            }
        }
    }

    #[test]
    fn test_upsert_both_without_name_uses_key() {
        let mut dictionary = MentionDictionary::new();
        dictionary.upsert(
            "alice",
            MentionEntry::both(&alice_handle(), &alice_token(), None),
        );
        assert_eq!(
            dictionary.display_for_token(&alice_token().to_string()),
            Some("alice")
        );
    }

    #[test]
    fn test_single_scope_leaves_reverse_index_alone() {
        let mut dictionary = MentionDictionary::new();
        dictionary.upsert(
            "Alice W.",
            MentionEntry::network_b(&alice_token(), Some("Alice W.".to_string())),
        );
        assert!(dictionary.reverse_index().is_empty());
    }

    #[test]
    fn test_upsert_supersedes() {
        let mut dictionary = MentionDictionary::new();
        dictionary.upsert("alice", MentionEntry::network_a(&alice_handle()));
        dictionary.upsert(
            "alice",
            MentionEntry::both(&alice_handle(), &alice_token(), None),
        );
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary.get("alice").unwrap().scope(), MentionScope::Both);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_entry() {
        let result: Result<MentionEntry, _> = serde_json::from_str(
            r#"{ "networkAHandle": "@alice", "scope": "both" }"#,
        );
        assert!(result.is_err());

        let result: Result<MentionEntry, _> = serde_json::from_str(
            r#"{ "networkAHandle": "@alice", "networkBToken": "nostr:x", "scope": "networkAOnly" }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rebuilds_reverse_index() {
        let json = format!(
            r#"{{ "entries": {{ "alice": {{ "networkAHandle": "@alice", "networkBToken": "{}", "networkBDisplayName": "Alice W.", "scope": "both" }} }} }}"#,
            alice_token().to_string()
        );
        let dictionary: MentionDictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(
            dictionary.display_for_token(&alice_token().to_string()),
            Some("Alice W.")
        );
    }

    #[test]
    fn test_serialize_round_trip_keeps_superseded_tokens() {
        let mut dictionary = MentionDictionary::new();
        dictionary.upsert(
            "alice",
            MentionEntry::both(&alice_handle(), &alice_token(), Some("Alice W.".to_string())),
        );
        dictionary.upsert("alice", MentionEntry::network_a(&alice_handle()));

        let json = serde_json::to_string(&dictionary).unwrap();
        let restored: MentionDictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, dictionary);
    }
}
