//! Core types for SMTP submission service discovery.
//!
//! This crate provides the value types shared across the mailconf
//! workspace:
//!
//! - [`SmtpConfig`]: the outbound server configuration produced by a
//!   successful discovery
//! - [`Encryption`]: how TLS is negotiated with that server
//! - [`DiscoverError`]: everything that can go wrong while discovering

mod error;
mod types;

pub use error::{DiscoverError, Result};
pub use types::{Encryption, SmtpConfig};
