//! Core domain + application logic for the Ouranos Telegram chatbot.
//!
//! This crate is intentionally framework-agnostic. Telegram, the Ouranos service
//! API and the token service live behind ports (traits) implemented in adapter
//! crates.

pub mod auth;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod guards;
pub mod linking;
pub mod logging;
pub mod ports;
pub mod templates;

#[cfg(test)]
pub(crate) mod fakes;

pub use errors::{Error, Result};
