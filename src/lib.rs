//! Scrape the "Recent Port Calls" of a fleet of ships and publish them as RSS.

pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod item;
pub mod pipeline;
pub mod store;
pub mod timefmt;

pub use error::{Error, Result};
