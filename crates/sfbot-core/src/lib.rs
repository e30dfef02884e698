//! Core domain + application logic for the Seafile upload bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and Seafile live
//! behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod controller;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod ports;
pub mod security;
pub mod texts;
pub mod utils;

pub use errors::{Error, Result};
