use log::{debug, warn};
use thiserror::Error as ThisError;
use xpost_mention::{marker, markers, MentionEntry, MentionScope};
use xpost_msg::{Network, NetworkAProfile, NetworkBProfile, SearchResult};
use xpost_ref::{is_raw_identifier, HandleRef, ProfileRef, RefError, PROFILE_PREFIX};

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum SelectionError {
    #[error("Mention query at {start}..{end} does not match the content")]
    InvalidSpan { start: usize, end: usize },
    #[error("Selected profile has an unusable identifier, cause: {0}")]
    Identifier(#[from] RefError),
}

/// The `@partial` text a mention search was started from. `start` is the
/// byte offset of the `@`, `text` is what follows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionQuery {
    pub start: usize,
    pub text: String,
}

impl MentionQuery {
    pub fn new(start: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }

    /// Byte offset just past the query.
    pub fn end(&self) -> usize {
        self.start + 1 + self.text.len()
    }

    /// Finds the mention being typed right before `cursor`: an `@` that
    /// starts a word, followed by non-blank text up to the cursor. Text
    /// inside existing markers never counts.
    pub fn at_cursor(content: &str, cursor: usize) -> Option<Self> {
        if cursor > content.len() || !content.is_char_boundary(cursor) {
            return None;
        }
        let before = &content[..cursor];
        let start = before.rfind('@')?;
        let text = &before[start + 1..];
        if text.chars().any(|c| c.is_whitespace() || c == '`' || c == '@') {
            return None;
        }
        let starts_word = before[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric() && c != '`')
            .unwrap_or(true);
        if !starts_word {
            return None;
        }
        if markers(content).any(|found| found.range.contains(&start)) {
            return None;
        }
        Some(Self::new(start, text))
    }
}

/// What picking a search result does to a draft. Nothing is applied
/// until the caller commits it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub content: String,
    pub entry: MentionEntry,
    pub keys: Vec<String>,
    /// Byte offset just past the inserted marker.
    pub cursor: usize,
}

/// Resolves `result` into a mention entry and replaces the query span
/// with its marker.
///
/// A linked result becomes a `Both` mention when its counterpart can be
/// found, from the result's own mapping or from a result in `snapshot`
/// on the other network sharing its pin. Otherwise it stays single
/// network.
pub fn select_mention(
    result: &SearchResult,
    snapshot: &[SearchResult],
    content: &str,
    query: &MentionQuery,
    active: Network,
) -> Result<Selection, SelectionError> {
    let end = check_span(content, query)?;

    let (entry, names) = match resolve_both(result, snapshot)? {
        Some(both) => both,
        None => single(result)?,
    };

    let name = match (entry.scope(), active) {
        (MentionScope::Both, Network::NetworkA) => names.network_a.clone(),
        (MentionScope::Both, Network::NetworkB) => names.network_b.clone(),
        _ => result.display_name(),
    };

    let mut keys = vec![name.clone()];
    if entry.scope() == MentionScope::Both {
        push_key(&mut keys, names.network_a);
        push_key(&mut keys, names.network_b);
    }
    if is_raw_identifier(&query.text) {
        push_key(&mut keys, query.text.trim().to_string());
    }

    let inserted = marker(&name);
    let rest = &content[end..];
    let spacer = if rest.starts_with(char::is_whitespace) {
        ""
    } else {
        " "
    };
    let cursor = query.start + inserted.len() + spacer.len();
    let content = format!("{}{}{}{}", &content[..query.start], inserted, spacer, rest);

    debug!("selected mention {:?} as {:?}", result.identity_key(), keys);

    Ok(Selection {
        content,
        entry,
        keys,
        cursor,
    })
}

/// The name a `Both` mention shows on each network.
struct Names {
    network_a: String,
    network_b: String,
}

fn push_key(keys: &mut Vec<String>, key: String) {
    if !key.is_empty() && !keys.contains(&key) {
        keys.push(key);
    }
}

fn check_span(content: &str, query: &MentionQuery) -> Result<usize, SelectionError> {
    let end = query.end();
    let valid = end <= content.len()
        && content.is_char_boundary(query.start)
        && content.is_char_boundary(end)
        && content[query.start..].starts_with('@')
        && content[query.start + 1..end] == query.text;
    if valid {
        Ok(end)
    } else {
        Err(SelectionError::InvalidSpan {
            start: query.start,
            end,
        })
    }
}

fn single(result: &SearchResult) -> Result<(MentionEntry, Names), SelectionError> {
    let entry = match result {
        SearchResult::NetworkA(profile) => MentionEntry::network_a(&profile.handle()?),
        SearchResult::NetworkB(profile) => {
            MentionEntry::network_b(&profile.token()?, Some(profile.label()))
        }
    };
    let name = result.display_name();
    Ok((
        entry,
        Names {
            network_a: name.clone(),
            network_b: name,
        },
    ))
}

fn resolve_both(
    result: &SearchResult,
    snapshot: &[SearchResult],
) -> Result<Option<(MentionEntry, Names)>, SelectionError> {
    if !result.is_linked() {
        return Ok(None);
    }

    let resolved = match result {
        SearchResult::NetworkA(profile) => {
            let handle = profile.handle()?;
            counterpart_b(profile, snapshot, result).map(|(token, label)| (handle, token, label))
        }
        SearchResult::NetworkB(profile) => {
            let token = profile.token()?;
            counterpart_a(profile, snapshot, result).map(|handle| (handle, token, profile.label()))
        }
    };

    match resolved {
        Some((handle, token, label)) => {
            let names = Names {
                network_a: handle.username().to_string(),
                network_b: label.clone(),
            };
            Ok(Some((MentionEntry::both(&handle, &token, Some(label)), names)))
        }
        None => {
            warn!(
                "DictionaryResolutionGap: no counterpart found for linked profile {}, mentioning it on {} only",
                result.identity_key(),
                result.network()
            );
            Ok(None)
        }
    }
}

// Network B counterpart of a Network A profile: token and display name.
fn counterpart_b(
    profile: &NetworkAProfile,
    snapshot: &[SearchResult],
    result: &SearchResult,
) -> Option<(ProfileRef, String)> {
    if let Some(mapping) = &profile.cross_platform_mapping {
        let token = mapping.pubkey.as_deref().and_then(|key| {
            if key.starts_with(PROFILE_PREFIX) || ProfileRef::is_match(key) {
                ProfileRef::from_string(key.to_string()).ok()
            } else {
                ProfileRef::from_pubkey(key).ok()
            }
        });
        if let Some(token) = token {
            let label = mapping
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| profile.username.clone());
            return Some((token, label));
        }
    }

    match sibling(result, snapshot)? {
        SearchResult::NetworkB(sibling) => Some((sibling.token().ok()?, sibling.label())),
        SearchResult::NetworkA(_) => None,
    }
}

fn counterpart_a(
    profile: &NetworkBProfile,
    snapshot: &[SearchResult],
    result: &SearchResult,
) -> Option<HandleRef> {
    let from_mapping = profile
        .cross_platform_mapping
        .as_ref()
        .and_then(|mapping| mapping.handle.clone())
        .and_then(|handle| HandleRef::from_string(handle).ok());
    if from_mapping.is_some() {
        return from_mapping;
    }

    match sibling(result, snapshot)? {
        SearchResult::NetworkA(sibling) => sibling.handle().ok(),
        SearchResult::NetworkB(_) => None,
    }
}

// A result on the other network saved under the same pin.
fn sibling<'a>(result: &SearchResult, snapshot: &'a [SearchResult]) -> Option<&'a SearchResult> {
    let pin_id = result.pin().pin_id.as_deref()?;
    snapshot.iter().find(|candidate| {
        candidate.network() == result.network().other()
            && candidate.pin().pin_id.as_deref() == Some(pin_id)
    })
}
