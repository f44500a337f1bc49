//! Antidetect profile manager integration
//!
//! Thin HTTP client over the local profile manager's API. Transport errors
//! are soft failures: logged and degraded to "unavailable" / empty results.

mod client;

pub use client::{Profile, ProfileClient, ProfileClientError};
