//! Core library for rollbook.
//!
//! - `api`: REST client for the account and document service
//! - `auth`: persisted session and keychain credentials
//! - `config`: configuration file and environment overrides
//! - `models`: identity and student records
//! - `roster`: the session/roster state machine front ends drive

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod roster;

pub use config::Config;
