//! Storefront-specific modules: HTTP client, site settings and offer models.

pub mod client;
pub mod models;
pub mod site;

pub use client::{ShopClient, Storefront};
pub use models::{Candidate, Offer};
pub use site::{Site, Source};
