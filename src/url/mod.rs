//! URL handling module for Novel-Crawler
//!
//! This module provides link resolution against a source's base URL,
//! canonicalisation of the resulting URLs (used as dedup keys), and slug
//! derivation for novel titles.

mod normalize;
mod slug;

// Re-export main functions
pub use normalize::{canonicalize_url, resolve_link};
pub use slug::slugify;
