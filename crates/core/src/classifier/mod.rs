//! Classification of inbound chat lines.
//!
//! Lines pass through two steps:
//! 1. [`screen`] decides from the sender and recipient alone whether a line is
//!    worth looking at.
//! 2. [`LineClassifier::classify`] strips inline formatting and matches the
//!    text against the search bot's message templates for the active
//!    negotiation.

mod format;
mod screen;
mod templates;

pub use format::strip_formatting;
pub use screen::{screen, Screening, ScreeningRules};
pub use templates::{results_archive_name, Classification, LineClassifier};
