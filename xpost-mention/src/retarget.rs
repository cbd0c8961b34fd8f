use xpost_msg::Network;

use crate::{
    dictionary::{MentionDictionary, MentionScope},
    markers::{markers, rewrite_markers},
};

/// Rewrites the names shown inside markers for the active preview network.
///
/// Towards Network A, each `Both` marker shows the Network A username.
/// Towards Network B, the Network B tokens the synthesizer would emit are
/// collected in document order and handed out to markers positionally, and
/// each token is mapped back to a display name through the reverse index.
/// Markers do not carry their own token, so this pairing is by position
/// rather than by marker identity.
pub fn retarget(content: &str, dictionary: &MentionDictionary, active: Network) -> String {
    match active {
        Network::NetworkA => rewrite_markers(content, |name| {
            let entry = dictionary.get(name)?;
            if entry.scope() != MentionScope::Both {
                return None;
            }
            entry
                .network_a_handle()
                .map(|handle| handle.trim_start_matches('@').to_string())
        }),
        Network::NetworkB => {
            let mut tokens = markers(content)
                .filter_map(|found| {
                    dictionary
                        .get(found.name)
                        .and_then(|entry| entry.token_for(Network::NetworkB))
                })
                .collect::<Vec<&str>>()
                .into_iter();

            rewrite_markers(content, |name| {
                dictionary
                    .get(name)
                    .and_then(|entry| entry.token_for(Network::NetworkB))?;
                let token = tokens.next()?;
                dictionary.display_for_token(token).map(str::to_string)
            })
        }
    }
}
