use futures::StreamExt;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use xpost_msg::{Network, SearchRequest};

use crate::{
    config::SearchConfig,
    debounce::Debouncer,
    state::StreamState,
    transport::{SearchTransport, TransportError},
};

#[derive(Debug, ThisError)]
pub enum SearchError {
    #[error("Search failed after falling back to batch search, cause: {0}")]
    Transport(#[source] TransportError),
    #[error("Search was superseded by a newer query")]
    Cancelled,
}

/// One consumer's search. Starting a search cancels the one in flight,
/// which drops its stream and with it the underlying connection.
///
/// The merged state is published on a watch channel; consumers take
/// snapshots from it rather than holding on to live results.
pub struct SearchSession<T> {
    transport: Arc<T>,
    config: SearchConfig,
    state: watch::Sender<StreamState>,
    inflight: Mutex<Option<CancellationToken>>,
}

impl<T> SearchSession<T>
where
    T: SearchTransport,
{
    pub fn new(transport: T, config: SearchConfig) -> Self {
        Self::with_shared(Arc::new(transport), config)
    }

    pub fn with_shared(transport: Arc<T>, config: SearchConfig) -> Self {
        let (state, _) = watch::channel(StreamState::default());
        Self {
            transport,
            config,
            state,
            inflight: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn request(&self, query: &str, networks: &[Network]) -> SearchRequest {
        self.config.request(query, networks)
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Copy of the merged results as they are right now.
    pub fn snapshot(&self) -> StreamState {
        self.state.borrow().clone()
    }

    /// Cancels the search in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.inflight.lock().take() {
            debug!("cancelling in-flight search");
            token.cancel();
        }
    }

    pub async fn search(&self, request: SearchRequest) -> Result<StreamState, SearchError> {
        let token = self.begin();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SearchError::Cancelled),
            result = self.run(&request, &token) => result,
        };

        if !token.is_cancelled() {
            self.inflight.lock().take();
        }
        result
    }

    /// A debouncer using the configured quiet period.
    pub fn debouncer(&self) -> Debouncer {
        Debouncer::new(self.config.debounce())
    }

    /// Runs `request` once `debouncer` has seen no newer call for its
    /// quiet period. Results are published to [`Self::subscribe`].
    pub fn search_debounced(self: &Arc<Self>, debouncer: &mut Debouncer, request: SearchRequest)
    where
        T: 'static,
    {
        let session = Arc::clone(self);
        debouncer.call(async move {
            if let Err(error) = session.search(request).await {
                debug!("debounced search ended early: {}", error);
            }
        });
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.inflight.lock().replace(token.clone()) {
            debug!("superseding in-flight search");
            previous.cancel();
        }
        self.state.send_replace(StreamState::loading());
        token
    }

    async fn run(
        &self,
        request: &SearchRequest,
        token: &CancellationToken,
    ) -> Result<StreamState, SearchError> {
        let error = match self.stream(request, token).await {
            Ok(Some(state)) => return Ok(state),
            Ok(None) => return Err(SearchError::Cancelled),
            Err(error) => error,
        };

        warn!(
            "Search stream failed, falling back to batch search, cause: {}",
            error
        );
        let batch = self.transport.batch(request).await;
        if token.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        match batch {
            Ok(results) => {
                let state = StreamState::from_batch(results);
                self.state.send_replace(state.clone());
                Ok(state)
            }
            Err(error) => {
                let message = error.to_string();
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(message);
                });
                Err(SearchError::Transport(error))
            }
        }
    }

    // Ok(None) when cancelled part way.
    async fn stream(
        &self,
        request: &SearchRequest,
        token: &CancellationToken,
    ) -> Result<Option<StreamState>, TransportError> {
        let mut frames = self.transport.stream(request).await?;
        let mut state = StreamState::loading();

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            if token.is_cancelled() {
                return Ok(None);
            }
            state.apply(frame.into());
            self.state.send_replace(state.clone());
        }

        if token.is_cancelled() {
            return Ok(None);
        }
        state.loading = false;
        self.state.send_replace(state.clone());
        Ok(Some(state))
    }
}
