//! dealwatch - Storefront discount watcher
//!
//! Scans listing pages for discounted products, extracts prices from
//! unstable markup and notifies each qualifying offer once over Telegram.

pub mod commands;
pub mod config;
pub mod extract;
pub mod filters;
pub mod format;
pub mod notify;
pub mod shop;
pub mod state;

pub use config::Config;
pub use shop::{Offer, Site, Source};
