use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

/// A resolved mention span, `` `@name` ``, inside canonical content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker<'a> {
    pub range: Range<usize>,
    pub name: &'a str,
}

fn marker_regex() -> &'static Regex {
    lazy_static! {
        static ref RE: Regex = Regex::new("`@([^`\n]+)`").unwrap();
    }
    &RE
}

/// Builds the marker for a display name. Backticks and line breaks cannot
/// appear inside a marker, so they are dropped from the name.
pub fn marker(name: &str) -> String {
    let name: String = name
        .chars()
        .filter(|c| *c != '`' && *c != '\n' && *c != '\r')
        .collect();
    format!("`@{}`", name)
}

/// All markers in document order.
pub fn markers(content: &str) -> impl Iterator<Item = Marker<'_>> {
    marker_regex().captures_iter(content).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?;
        Some(Marker {
            range: whole.range(),
            name: name.as_str(),
        })
    })
}

/// Rewrites the name inside each marker. Returning `None` keeps the marker
/// as it is; the delimiters are always preserved.
pub fn rewrite_markers<F>(content: &str, mut rename: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut output = String::with_capacity(content.len());
    let mut last_match_end = 0;
    for found in markers(content) {
        output.push_str(&content[last_match_end..found.range.start]);
        match rename(found.name) {
            Some(name) => output.push_str(&marker(&name)),
            None => output.push_str(&content[found.range.clone()]),
        }
        last_match_end = found.range.end;
    }
    output.push_str(&content[last_match_end..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_in_order() {
        let content = "hey `@alice` and `@Bob W.`, plain @carol";
        let found: Vec<&str> = markers(content).map(|m| m.name).collect();
        assert_eq!(found, vec!["alice", "Bob W."]);

        let first = markers(content).next().unwrap();
        assert_eq!(&content[first.range], "`@alice`");
    }

    #[test]
    fn test_marker_does_not_span_lines() {
        let content = "`@ali\nce`";
        assert_eq!(markers(content).count(), 0);
    }

    #[test]
    fn test_marker_strips_delimiters_from_name() {
        assert_eq!(marker("al`ice"), "`@alice`");
    }

    #[test]
    fn test_rewrite_markers_keeps_unrenamed() {
        let content = "`@alice` meets `@bob`!";
        let output = rewrite_markers(content, |name| {
            if name == "alice" {
                Some("Alice W.".to_string())
            } else {
                None
            }
        });
        assert_eq!(output, "`@Alice W.` meets `@bob`!");
    }
}
