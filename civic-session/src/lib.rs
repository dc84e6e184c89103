//! Client-side conversation session engine for the city-services assistant.
//!
//! The engine decides whether the user is a guest or signed in, exchanges
//! messages with the backend under that identity, and drives a cosmetic
//! loading sequence that is decoupled from network timing:
//! - [`ChatSession`] owns the active conversation, the input history and the
//!   loading state, and performs sends.
//! - [`SearchDebouncer`] coalesces search-box edits into one delayed request.
//! - [`LivenessPoller`] re-validates the stored credential and fires the
//!   shared [`ResetLatch`] the first time it lapses.
//!
//! Persistence goes through a [`SessionStore`], so tests can substitute an
//! in-memory store for the file-backed one.

mod conversation;
mod error;
mod history;
mod identity;
mod liveness;
mod loading;
mod message;
mod search;
mod session;
mod store;

pub use conversation::ConversationCache;
pub use error::{SendRejected, SessionError};
pub use history::InputHistory;
pub use identity::{Identity, IdentityResolver, LaunchKind};
pub use liveness::{DEFAULT_POLL_INTERVAL, LivenessCheck, LivenessPoller, ResetLatch};
pub use loading::{LoadingMachine, LoadingSchedule, LoadingState, SendCycle};
pub use message::{Message, Provenance};
pub use search::{DEFAULT_SEARCH_DELAY, SearchDebouncer, SearchState};
pub use session::{ChatSession, FALLBACK_REPLY};
pub use store::{FileSessionStore, MemorySessionStore, SessionKey, SessionStore, SessionStoreError};
