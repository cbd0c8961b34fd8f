use log::debug;
use xpost_msg::{FrameType, SearchResult, Source, StreamFrame};

/// One step of a streamed search.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchEvent {
    Partial {
        source: Source,
        results: Vec<SearchResult>,
        completed_sources: Vec<String>,
    },
    Complete {
        completed_sources: Vec<String>,
    },
    Error {
        source: Option<String>,
        message: String,
        completed_sources: Vec<String>,
    },
}

impl From<StreamFrame> for SearchEvent {
    fn from(frame: StreamFrame) -> Self {
        match frame.frame_type {
            FrameType::Partial => SearchEvent::Partial {
                source: Source::from(frame.source.as_deref().unwrap_or_default()),
                results: frame.results,
                completed_sources: frame.completed_sources,
            },
            FrameType::Complete => SearchEvent::Complete {
                completed_sources: frame.completed_sources,
            },
            FrameType::Error => SearchEvent::Error {
                source: frame.source,
                message: frame
                    .error
                    .unwrap_or_else(|| "search source failed".to_string()),
                completed_sources: frame.completed_sources,
            },
        }
    }
}

/// Merged view of one search. Replaced, never reused, when a new query
/// starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamState {
    pub results: Vec<SearchResult>,
    pub loading: bool,
    pub completed_sources: Vec<String>,
    pub error: Option<String>,
}

impl StreamState {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    /// State for results fetched from the batch endpoint in one go.
    pub fn from_batch(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            loading: false,
            completed_sources: Vec::new(),
            error: None,
        }
    }

    pub fn apply(&mut self, event: SearchEvent) {
        match event {
            SearchEvent::Partial {
                source,
                results,
                completed_sources,
            } => {
                debug!(
                    "partial search batch from {}: {} results",
                    source.as_str(),
                    results.len()
                );
                match source {
                    Source::Profiles(_) => self.merge_profiles(results),
                    Source::Pins | Source::Other(_) => self.results.extend(results),
                }
                self.mark_completed(completed_sources);
            }
            SearchEvent::Complete { completed_sources } => {
                self.mark_completed(completed_sources);
                self.loading = false;
            }
            SearchEvent::Error {
                source,
                message,
                completed_sources,
            } => {
                self.error = Some(match source {
                    Some(source) => format!("{}: {}", source, message),
                    None => message,
                });
                self.mark_completed(completed_sources);
            }
        }
    }

    // Replace by identity, but keep pin state the incoming result omits.
    fn merge_profiles(&mut self, results: Vec<SearchResult>) {
        for mut incoming in results {
            let key = incoming.identity_key();
            let position = self
                .results
                .iter()
                .position(|existing| existing.identity_key() == key);

            match position {
                Some(index) => {
                    let existing = &self.results[index];
                    incoming.pin_mut().inherit(existing.pin());
                    if incoming.mapping().is_none() {
                        *incoming.mapping_mut() = existing.mapping().cloned();
                    }
                    self.results[index] = incoming;
                }
                None => self.results.push(incoming),
            }
        }
    }

    fn mark_completed(&mut self, completed_sources: Vec<String>) {
        for source in completed_sources {
            if !self.completed_sources.contains(&source) {
                self.completed_sources.push(source);
            }
        }
    }
}
