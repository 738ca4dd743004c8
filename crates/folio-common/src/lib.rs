//! Common utilities for the Folio pagination engine.
//!
//! This crate provides shared infrastructure used by all engine components:
//! - **Diagnostics** - a leveled, de-duplicating message queue mirrored to `tracing`
//! - **Networking** - blocking loaders for `http(s):`, `data:` and file resources
//! - **URL resolution** - relative references against documents and stylesheets

pub mod diagnostics;
pub mod net;
pub mod url;

pub use diagnostics::{Level, Message, MessageQueue};
pub use net::{FetchError, fetch_bytes, fetch_text};
pub use url::{percent_decode, percent_encode_fragment, resolve_url, split_fragment};
