//! Ouranos service adapters.
//!
//! Implements the data, control and token ports of `ocb-core` against the
//! Ouranos HTTP API.

mod client;
mod tokens;

pub use client::{HttpDispatcher, HttpPlatform, HttpSession};
pub use tokens::JwtTokenVerifier;
