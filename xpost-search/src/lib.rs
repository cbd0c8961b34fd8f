//! Federated profile search: a reducer that merges streamed result
//! batches, the transport it reads them from, and a session that keeps at
//! most one search in flight.

mod config;
mod debounce;
mod http;
mod session;
mod state;
mod transport;

pub use config::SearchConfig;
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use http::{decode_frames, HttpTransport};
pub use session::{SearchError, SearchSession};
pub use state::{SearchEvent, StreamState};
pub use transport::{FrameStream, SearchTransport, TransportError};
