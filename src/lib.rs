//! teamslink - Microsoft Teams meeting links from the terminal
//!
//! This library provides the OAuth2 PKCE token lifecycle, a retrying Graph
//! client, and the orchestration that turns them into a join URL.

pub mod api;
pub mod auth;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod meeting;
pub mod ui;

pub use error::{Error, Result};
