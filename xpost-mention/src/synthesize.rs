use xpost_msg::Network;

use crate::{dictionary::MentionDictionary, markers::markers};

/// Expands canonical content into the outbound text for `network`.
///
/// A marker whose mention is live on `network` becomes that network's
/// token. Any other marker, resolved or not, becomes plain `@name`. The
/// output never contains a backtick: stray ones outside markers are
/// dropped as well.
pub fn synthesize(content: &str, dictionary: &MentionDictionary, network: Network) -> String {
    let mut output = String::with_capacity(content.len());
    let mut last_match_end = 0;

    for found in markers(content) {
        push_text(&mut output, &content[last_match_end..found.range.start]);

        let token = dictionary
            .get(found.name)
            .and_then(|entry| entry.token_for(network));
        match token {
            Some(token) => output.push_str(token),
            None => {
                output.push('@');
                output.push_str(found.name);
            }
        }

        last_match_end = found.range.end;
    }
    push_text(&mut output, &content[last_match_end..]);

    output
}

fn push_text(output: &mut String, text: &str) {
    output.extend(text.chars().filter(|c| *c != '`'));
}
