//! A compose session: one canonical draft, the mentions resolved into
//! it, and the network its on-screen text currently shows.

use log::debug;
use serde::{Deserialize, Serialize};
use xpost_mention::{marker, markers, retarget, synthesize, MentionDictionary};
use xpost_msg::{Network, SearchResult};

mod pairing;
mod selection;

pub use pairing::{
    LinkMode, LinkingSearch, LinkingSession, PairOutcome, PairedMention, PairingError,
    PairingWorkflow,
};
pub use selection::{select_mention, MentionQuery, Selection, SelectionError};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeSession {
    content: String,
    #[serde(default)]
    dictionary: MentionDictionary,
    #[serde(default = "default_network")]
    active_network: Network,
}

fn default_network() -> Network {
    Network::NetworkA
}

impl Default for ComposeSession {
    fn default() -> Self {
        Self::new("")
    }
}

impl ComposeSession {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            dictionary: MentionDictionary::new(),
            active_network: default_network(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn dictionary(&self) -> &MentionDictionary {
        &self.dictionary
    }

    pub fn active_network(&self) -> Network {
        self.active_network
    }

    /// Replaces the draft with text the user edited directly.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Outbound text for `network`.
    pub fn preview(&self, network: Network) -> String {
        synthesize(&self.content, &self.dictionary, network)
    }

    /// Switches the preview network and renames markers to match.
    pub fn set_active_network(&mut self, network: Network) {
        self.content = retarget(&self.content, &self.dictionary, network);
        self.active_network = network;
    }

    pub fn mention_at_cursor(&self, cursor: usize) -> Option<MentionQuery> {
        MentionQuery::at_cursor(&self.content, cursor)
    }

    /// Inserts the mention for a picked search result in place of `query`.
    /// Returns the cursor position just past the new marker.
    pub fn select(
        &mut self,
        result: &SearchResult,
        snapshot: &[SearchResult],
        query: &MentionQuery,
    ) -> Result<usize, SelectionError> {
        let selection = select_mention(result, snapshot, &self.content, query, self.active_network)?;

        for key in selection.keys {
            self.dictionary.upsert(key, selection.entry.clone());
        }
        self.content = selection.content;

        Ok(selection.cursor)
    }

    /// Records a confirmed pairing and turns plain `@identifier` mentions
    /// of the paired profile into markers. Returns how many were replaced.
    pub fn apply_pairing(&mut self, paired: &PairedMention) -> usize {
        for key in &paired.keys {
            self.dictionary.upsert(key.clone(), paired.entry.clone());
        }

        let replacement = marker(paired.name_for(self.active_network));
        let mut replaced = 0;
        for identifier in &paired.identifiers {
            let (content, count) =
                replace_plain_mentions(&self.content, identifier, &replacement);
            self.content = content;
            replaced += count;
        }

        debug!("pairing replaced {} plain mentions", replaced);
        replaced
    }
}

// Replaces `@identifier` as a whole word, leaving markers untouched.
fn replace_plain_mentions(content: &str, identifier: &str, replacement: &str) -> (String, usize) {
    let needle = format!("@{}", identifier);
    let mut output = String::with_capacity(content.len());
    let mut count = 0;
    let mut last_match_end = 0;

    let spans = markers(content)
        .map(|found| found.range)
        .chain(std::iter::once(content.len()..content.len()));
    for span in spans {
        count += replace_in_text(
            &content[last_match_end..span.start],
            &needle,
            replacement,
            &mut output,
        );
        output.push_str(&content[span.clone()]);
        last_match_end = span.end;
    }

    (output, count)
}

fn replace_in_text(text: &str, needle: &str, replacement: &str, output: &mut String) -> usize {
    let mut count = 0;
    let mut last_match_end = 0;

    for (index, _) in text.match_indices(needle) {
        let end = index + needle.len();
        let starts_word = text[..index]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let ends_word = text[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true);
        if starts_word && ends_word {
            output.push_str(&text[last_match_end..index]);
            output.push_str(replacement);
            last_match_end = end;
            count += 1;
        }
    }
    output.push_str(&text[last_match_end..]);

    count
}
