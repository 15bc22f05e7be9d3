//! Core domain + application logic for the Intui dream-interpretation bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the completion API
//! live behind ports (traits) implemented in adapter crates.

pub mod command;
pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod failure;
pub mod formatting;
pub mod handler;
pub mod logging;
pub mod messaging;
pub mod notify;
pub mod persona;
pub mod ratelimit;
pub mod session;
pub mod usage;

pub use errors::{CollaboratorError, Error, Result};
