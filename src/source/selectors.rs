//! CSS selectors for reading a source's pages.

use crate::ConfigError;
use scraper::Selector;
use serde::Deserialize;

/// Selectors for a listing page; all but `list` are relative to a list row
#[derive(Debug, Clone, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each novel row on the listing page
    pub list: String,

    /// Selector for the title element within a row
    pub title: String,

    /// Selector for the cover `<img>` within a row
    pub cover: String,

    /// Selector for the author element within a row
    pub author: String,

    /// Selector for the `<a>` linking to the novel's detail page
    #[serde(rename = "detail-link")]
    pub detail_link: String,
}

/// Selectors for a novel detail page
#[derive(Debug, Clone, Deserialize)]
pub struct DetailSelectors {
    pub description: String,

    /// Matches every genre tag element
    pub genres: String,

    pub status: String,

    pub rating: String,

    /// Selector for each chapter row in the chapter index
    #[serde(rename = "chapter-list")]
    pub chapter_list: String,

    /// Selector for the chapter title, relative to a chapter row
    #[serde(rename = "chapter-title")]
    pub chapter_title: String,

    /// Selector for the chapter `<a>`, relative to a chapter row
    #[serde(rename = "chapter-link")]
    pub chapter_link: String,

    /// Selector for the chapter date, relative to a chapter row
    #[serde(rename = "chapter-date")]
    pub chapter_date: String,
}

/// Selectors for a chapter page
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterSelectors {
    /// Selector for the element holding the chapter body
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompiledListingSelectors {
    pub list: Selector,
    pub title: Selector,
    pub cover: Selector,
    pub author: Selector,
    pub detail_link: Selector,
}

#[derive(Debug, Clone)]
pub struct CompiledDetailSelectors {
    pub description: Selector,
    pub genres: Selector,
    pub status: Selector,
    pub rating: Selector,
    pub chapter_list: Selector,
    pub chapter_title: Selector,
    pub chapter_link: Selector,
    pub chapter_date: Selector,
}

#[derive(Debug, Clone)]
pub struct CompiledChapterSelectors {
    pub content: Selector,
}

fn compile(source: &str, field: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        source_name: source.to_string(),
        field,
        message: format!("'{}': {:?}", css, e),
    })
}

impl ListingSelectors {
    pub fn compile(&self, source: &str) -> Result<CompiledListingSelectors, ConfigError> {
        Ok(CompiledListingSelectors {
            list: compile(source, "list", &self.list)?,
            title: compile(source, "title", &self.title)?,
            cover: compile(source, "cover", &self.cover)?,
            author: compile(source, "author", &self.author)?,
            detail_link: compile(source, "detail-link", &self.detail_link)?,
        })
    }
}

impl DetailSelectors {
    pub fn compile(&self, source: &str) -> Result<CompiledDetailSelectors, ConfigError> {
        Ok(CompiledDetailSelectors {
            description: compile(source, "description", &self.description)?,
            genres: compile(source, "genres", &self.genres)?,
            status: compile(source, "status", &self.status)?,
            rating: compile(source, "rating", &self.rating)?,
            chapter_list: compile(source, "chapter-list", &self.chapter_list)?,
            chapter_title: compile(source, "chapter-title", &self.chapter_title)?,
            chapter_link: compile(source, "chapter-link", &self.chapter_link)?,
            chapter_date: compile(source, "chapter-date", &self.chapter_date)?,
        })
    }
}

impl ChapterSelectors {
    pub fn compile(&self, source: &str) -> Result<CompiledChapterSelectors, ConfigError> {
        Ok(CompiledChapterSelectors {
            content: compile(source, "content", &self.content)?,
        })
    }
}
