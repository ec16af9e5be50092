//! REST client module for the roster service.
//!
//! This module provides the `ServiceClient` for the Appwrite-style REST API
//! (account sessions and documents in one collection), the `RosterBackend`
//! trait the state machine is written against, and list queries.
//!
//! Authenticated requests carry the session secret as the
//! `a_session_<project>` cookie.

pub mod backend;
pub mod client;
pub mod error;
pub mod query;

pub use backend::RosterBackend;
pub use client::ServiceClient;
pub use error::ApiError;
pub use query::{Query, CREATED_AT};
