//! Source registry
//!
//! A source is a site definition: a base URL plus the CSS selectors needed to
//! read its listing page, its novel detail pages and, optionally, its chapter
//! pages. Sources are plain data; adding a site is a configuration change and
//! never needs a new type.
//!
//! Definitions are compiled once into [`CompiledSource`] values (parsed base
//! URL and parsed selectors) and collected in an immutable [`SourceRegistry`]
//! that is handed to the scheduler.

mod selectors;

pub use selectors::{
    ChapterSelectors, CompiledChapterSelectors, CompiledDetailSelectors,
    CompiledListingSelectors, DetailSelectors, ListingSelectors,
};

use crate::ConfigError;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// A source site definition as written in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Display name, also stored on every novel found through this source
    pub name: String,

    /// Base URL used to resolve relative links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the listing page relative to the base URL (the base URL itself when absent)
    #[serde(rename = "listing-path", default)]
    pub listing_path: Option<String>,

    pub listing: ListingSelectors,

    pub detail: DetailSelectors,

    /// Selectors for chapter pages; without them chapter content cannot be filled
    #[serde(default)]
    pub chapter: Option<ChapterSelectors>,
}

impl SourceDefinition {
    /// The built-in LightNovelWorld definition
    pub fn light_novel_world() -> Self {
        Self {
            name: "LightNovelWorld".to_string(),
            base_url: "https://www.lightnovelworld.com".to_string(),
            listing_path: None,
            listing: ListingSelectors {
                list: ".novel-list .novel-item".to_string(),
                title: ".novel-title a".to_string(),
                cover: ".novel-cover img".to_string(),
                author: ".novel-author".to_string(),
                detail_link: ".novel-title a".to_string(),
            },
            detail: DetailSelectors {
                description: ".summary".to_string(),
                genres: ".categories a".to_string(),
                status: ".header-stats .status strong".to_string(),
                rating: ".header-stats .rating strong".to_string(),
                chapter_list: ".chapter-list li".to_string(),
                chapter_title: "a".to_string(),
                chapter_link: "a".to_string(),
                chapter_date: ".chapter-date".to_string(),
            },
            chapter: Some(ChapterSelectors {
                content: "#chapter-container".to_string(),
            }),
        }
    }
}

/// A source definition with its base URL and selectors parsed
#[derive(Debug, Clone)]
pub struct CompiledSource {
    pub name: String,
    pub base_url: Url,
    pub listing_url: Url,
    pub listing: CompiledListingSelectors,
    pub detail: CompiledDetailSelectors,
    pub chapter: Option<CompiledChapterSelectors>,
}

impl CompiledSource {
    /// Parses the base URL and every selector of a definition
    ///
    /// # Returns
    ///
    /// * `Ok(CompiledSource)` - All selectors are valid CSS
    /// * `Err(ConfigError)` - The URL or a selector is invalid
    pub fn compile(definition: &SourceDefinition) -> Result<Self, ConfigError> {
        if definition.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        let base_url = Url::parse(&definition.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid base-url '{}' for source '{}': {}",
                definition.base_url, definition.name, e
            ))
        })?;

        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "base-url '{}' for source '{}' must use HTTP or HTTPS",
                definition.base_url, definition.name
            )));
        }

        let listing_url = match &definition.listing_path {
            Some(path) => base_url.join(path).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid listing-path '{}' for source '{}': {}",
                    path, definition.name, e
                ))
            })?,
            None => base_url.clone(),
        };

        Ok(Self {
            name: definition.name.clone(),
            listing: definition.listing.compile(&definition.name)?,
            detail: definition.detail.compile(&definition.name)?,
            chapter: definition
                .chapter
                .as_ref()
                .map(|c| c.compile(&definition.name))
                .transpose()?,
            base_url,
            listing_url,
        })
    }
}

/// The immutable set of sources a crawl cycle walks through
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<CompiledSource>>,
}

impl SourceRegistry {
    /// Compiles a registry from definitions, rejecting duplicate names
    pub fn from_definitions(definitions: &[SourceDefinition]) -> Result<Self, ConfigError> {
        let mut sources: Vec<Arc<CompiledSource>> = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if sources.iter().any(|s| s.name == definition.name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate source name '{}'",
                    definition.name
                )));
            }
            sources.push(Arc::new(CompiledSource::compile(definition)?));
        }

        Ok(Self { sources })
    }

    /// The registry shipped with the crate
    pub fn builtin() -> Self {
        // The built-in definition is covered by tests, so compiling it cannot fail at runtime.
        Self::from_definitions(&[SourceDefinition::light_novel_world()]).unwrap_or_default()
    }

    /// Builds the registry for a configuration: its sources, or the built-in ones
    pub fn from_config(config: &crate::Config) -> Result<Self, ConfigError> {
        if config.sources.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::from_definitions(&config.sources)
        }
    }

    /// Looks up a source by name
    pub fn get(&self, name: &str) -> Option<&Arc<CompiledSource>> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledSource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
