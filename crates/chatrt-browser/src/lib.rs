//! Browser-automation platform adapter: navigates a WebDriver session,
//! authenticates, simulates human-like actions through [`chatrt_behavior`],
//! and polls the DOM for new messages.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod config;
pub mod error;
pub mod selectors;

pub use adapter::BrowserAdapter;
pub use config::{BrowserConfig, BrowserCredentials};
pub use error::BrowserError;
pub use selectors::Selectors;
