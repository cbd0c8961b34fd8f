use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error as ThisError;
use xpost_db::{Counterpart, Pin, PinStorage};
use xpost_mention::MentionEntry;
use xpost_msg::{Network, SearchResult};
use xpost_ref::{RefError, TOKEN_NAMESPACE};

#[derive(Debug, ThisError)]
pub enum PairingError {
    #[error("No linking session is active")]
    NotActive,
    #[error("A link is still being saved")]
    InFlight,
    #[error("Profile has no pin to unlink")]
    NotPinned,
    #[error("Linking session is in {0:?} mode")]
    WrongMode(LinkMode),
    #[error("Counterpart must be on {expected}, got {got}")]
    WrongNetwork { expected: Network, got: Network },
    #[error("Profile has an unusable identifier, cause: {0}")]
    Identifier(#[from] RefError),
    #[error("Failed to persist link, cause: {0}")]
    Persistence(#[from] xpost_db::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkMode {
    Pair,
    Unpair,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkingSession {
    pub source: SearchResult,
    pub target_network: Network,
    pub mode: LinkMode,
}

#[derive(Clone, Debug, PartialEq)]
enum PairingState {
    Idle,
    Active(LinkingSession),
    InFlight(LinkingSession),
}

/// The search to run for finding the counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkingSearch {
    pub networks: Vec<Network>,
    pub query: String,
}

/// A confirmed pairing, ready to be applied to a compose session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairedMention {
    pub entry: MentionEntry,
    /// Dictionary keys for the entry: the Network A username and the
    /// Network B display name.
    pub keys: Vec<String>,
    pub network_a_name: String,
    pub network_b_name: String,
    /// Raw identifiers of the source profile as a user would type them
    /// after an `@`.
    pub identifiers: Vec<String>,
}

impl PairedMention {
    pub fn name_for(&self, network: Network) -> &str {
        match network {
            Network::NetworkA => &self.network_a_name,
            Network::NetworkB => &self.network_b_name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PairOutcome {
    Linked(PairedMention),
    Unlinked(Pin),
    /// Another confirmation is still being persisted; nothing was done.
    Busy,
}

/// Links a pinned profile to its counterpart on the other network, or
/// removes that link.
///
/// `Idle -> Active -> InFlight -> Idle`. A failed confirmation goes back
/// to `Active` so the user can retry.
pub struct PairingWorkflow<S> {
    storage: Arc<S>,
    state: Mutex<PairingState>,
}

impl<S> PairingWorkflow<S>
where
    S: PinStorage,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            state: Mutex::new(PairingState::Idle),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Opens a session for `source`, replacing any session that is not
    /// being saved.
    pub fn start_linking(&self, source: SearchResult) -> Result<LinkingSearch, PairingError> {
        let target_network = source.network().other();
        let mode = if source.is_linked() {
            LinkMode::Unpair
        } else {
            LinkMode::Pair
        };
        let search = LinkingSearch {
            networks: vec![target_network],
            query: search_name(&source),
        };

        let mut state = self.state.lock();
        if let PairingState::InFlight(_) = &*state {
            return Err(PairingError::InFlight);
        }

        debug!(
            "start {:?} for {} towards {}",
            mode,
            source.identity_key(),
            target_network
        );
        *state = PairingState::Active(LinkingSession {
            source,
            target_network,
            mode,
        });

        Ok(search)
    }

    pub fn session(&self) -> Option<LinkingSession> {
        match &*self.state.lock() {
            PairingState::Idle => None,
            PairingState::Active(session) | PairingState::InFlight(session) => {
                Some(session.clone())
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(&*self.state.lock(), PairingState::InFlight(_))
    }

    /// Leaves the session. A confirmation being persisted still finishes.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if let PairingState::Active(_) = &*state {
            *state = PairingState::Idle;
        }
    }

    pub async fn confirm_pair(&self, target: &SearchResult) -> Result<PairOutcome, PairingError> {
        let guard = match self.begin(LinkMode::Pair, Some(target))? {
            Some(guard) => guard,
            None => return Ok(PairOutcome::Busy),
        };

        let paired = paired_mention(guard.source(), target)?;
        let result = self.persist_pair(guard.source(), target).await;
        guard.finish(result.is_ok());
        result?;

        Ok(PairOutcome::Linked(paired))
    }

    pub async fn confirm_unpair(&self) -> Result<PairOutcome, PairingError> {
        let guard = match self.begin(LinkMode::Unpair, None)? {
            Some(guard) => guard,
            None => return Ok(PairOutcome::Busy),
        };

        let result = self.persist_unpair(guard.source()).await;
        guard.finish(result.is_ok());

        Ok(PairOutcome::Unlinked(result?))
    }

    // Moves Active to InFlight. None when a confirmation is already in flight.
    fn begin(
        &self,
        mode: LinkMode,
        target: Option<&SearchResult>,
    ) -> Result<Option<InFlightGuard<'_>>, PairingError> {
        let mut state = self.state.lock();
        let session = match &*state {
            PairingState::Idle => return Err(PairingError::NotActive),
            PairingState::InFlight(_) => return Ok(None),
            PairingState::Active(session) => session.clone(),
        };

        if session.mode != mode {
            return Err(PairingError::WrongMode(session.mode));
        }
        if let Some(target) = target {
            if target.network() != session.target_network {
                return Err(PairingError::WrongNetwork {
                    expected: session.target_network,
                    got: target.network(),
                });
            }
        }

        *state = PairingState::InFlight(session.clone());
        drop(state);
        Ok(Some(InFlightGuard {
            state: &self.state,
            session,
            done: false,
        }))
    }

    async fn persist_pair(
        &self,
        source: &SearchResult,
        target: &SearchResult,
    ) -> Result<Pin, PairingError> {
        let pin_id = match &source.pin().pin_id {
            Some(pin_id) => pin_id.clone(),
            None => self.storage.create_pin(source).await?.id,
        };

        self.storage
            .link_profile(&pin_id, &Counterpart::from(target))
            .await
            .map_err(|error| {
                warn!("Failed to link pin {}, cause: {}", pin_id, error);
                PairingError::Persistence(error)
            })
    }

    async fn persist_unpair(&self, source: &SearchResult) -> Result<Pin, PairingError> {
        let pin_id = source
            .pin()
            .pin_id
            .as_deref()
            .ok_or(PairingError::NotPinned)?;

        Ok(self.storage.unlink_profile(pin_id).await?)
    }
}

// Holds the workflow in `InFlight`. Dropping it without a successful
// `finish`, as when the confirming future is dropped, puts the session
// back to `Active`.
struct InFlightGuard<'a> {
    state: &'a Mutex<PairingState>,
    session: LinkingSession,
    done: bool,
}

impl InFlightGuard<'_> {
    fn source(&self) -> &SearchResult {
        &self.session.source
    }

    fn finish(mut self, succeeded: bool) {
        if succeeded {
            self.done = true;
            *self.state.lock() = PairingState::Idle;
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.lock() = PairingState::Active(self.session.clone());
        }
    }
}

// Name to search the other network with.
fn search_name(source: &SearchResult) -> String {
    match source {
        SearchResult::NetworkA(profile) => profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&profile.username)
            .to_string(),
        SearchResult::NetworkB(profile) => profile.label(),
    }
}

fn paired_mention(source: &SearchResult, target: &SearchResult) -> Result<PairedMention, PairingError> {
    let (a, b) = match (source, target) {
        (SearchResult::NetworkA(a), SearchResult::NetworkB(b))
        | (SearchResult::NetworkB(b), SearchResult::NetworkA(a)) => (a, b),
        _ => {
            return Err(PairingError::WrongNetwork {
                expected: source.network().other(),
                got: target.network(),
            })
        }
    };

    let handle = a.handle()?;
    let token = b.token()?;
    let network_a_name = handle.username().to_string();
    let network_b_name = b.label();

    let mut keys = vec![network_a_name.clone()];
    if network_b_name != network_a_name {
        keys.push(network_b_name.clone());
    }

    let identifiers = match source {
        SearchResult::NetworkA(_) => vec![network_a_name.clone()],
        SearchResult::NetworkB(_) => vec![
            format!("{}:{}", TOKEN_NAMESPACE, token.npub()),
            token.npub().to_string(),
            b.pubkey.clone(),
        ],
    };

    Ok(PairedMention {
        entry: MentionEntry::both(&handle, &token, Some(network_b_name.clone())),
        keys,
        network_a_name,
        network_b_name,
        identifiers,
    })
}
