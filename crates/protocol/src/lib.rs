//! Wire types for the suite session bootstrap protocol.
//!
//! This crate contains the serde-serializable payloads exchanged between a
//! suite application, its own backend, and the Auth Hub. These types represent
//! the "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and a few
//!   invariant-preserving helpers
//! * 1:1 with the HTTP contract: field names match the JSON bodies
//! * Stable: Changes only when the wire contract changes
//!
//! Session recovery logic is built on top of these types in `suite-sso`.

pub mod auth_exchange;
pub mod cookie;
pub mod types;

pub use auth_exchange::*;
pub use cookie::*;
pub use types::*;
