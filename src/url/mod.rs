//! URL handling module for Crawl-Relay
//!
//! This module provides seed parsing, link normalization relative to the page
//! a link was found on, and the host comparison that keeps a crawl on its
//! seed's site.

mod domain;
mod normalize;

pub use domain::{host_key, same_host};
pub use normalize::{normalize_link, normalize_seed};
