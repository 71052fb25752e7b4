//! Search/download negotiation state machine.
//!
//! A negotiation walks a fixed progression of stages driven by classified
//! inbound lines and by the two outbound actions (submitting the search and
//! requesting a file):
//!
//! ```text
//! unstarted -> submitted -> accepted -> results_found -> download_request_submitted
//!                                    \-> results_not_found    -> download_request_accepted
//!                                                              -> download_sent
//! ```

mod download;
mod types;

pub use download::{DownloadRequest, DownloadRequestError};
pub use types::{
    transition, InvalidTransition, Negotiation, NegotiationError, NegotiationEvent,
    NegotiationOutcome, Outcome, Stage,
};
