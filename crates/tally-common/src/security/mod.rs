//! Security module for Tally
//!
//! Provides credential checks for the usage report endpoint:
//! - Bearer-key authorization against a configured key set

pub mod auth;

pub use auth::{AuthError, AuthorizationGate};
