//! Page fetching and closure-pattern extraction for facility sites.

pub mod client;
pub mod error;
pub mod extract;

pub use client::{PageClient, RawPageContent};
pub use error::FetchError;
pub use extract::{extract, PatternSignal};
