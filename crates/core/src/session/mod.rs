//! Bot session: connection lifecycle, request queue and negotiation
//! coordination.
//!
//! A [`Session`] spawns two tasks once connected:
//!
//! ```text
//!  transport events ──┐
//!                     ├──> coordinator ──> outbound IRC
//!  worker / caller ───┘        │
//!                              └──> SessionEvent broadcast
//! ```
//!
//! The worker waits for the server welcome, then hands queued searches to the
//! coordinator one at a time.

mod coordinator;
mod handle;
mod types;
mod worker;

pub use handle::Session;
pub use types::{PendingRequest, SessionError, SessionEvent};
