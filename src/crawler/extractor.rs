//! Generic selector-driven extraction
//!
//! One extractor serves every source: the differences between sites live in
//! the compiled selector sets, not in code. This module turns raw markup into:
//! - Listing entries (title, link, optional cover and author)
//! - Detail fields (description, genres, status, rating)
//! - Chapter stubs, in document order
//! - Chapter bodies for the on-demand content path
//!
//! Missing optional fields are never an error. The only failure is a body
//! that is not markup at all.

use crate::crawler::dates::parse_chapter_date_at;
use crate::source::{CompiledChapterSelectors, CompiledDetailSelectors, CompiledListingSelectors};
use crate::url::resolve_link;
use crate::ParseError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A novel row from a listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub title: String,
    pub cover_url: Option<String>,
    pub author: Option<String>,
    /// Canonical detail page URL
    pub url: Url,
}

/// Metadata read from a detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub rating: Option<String>,
}

/// A chapter reference from a detail page's chapter index
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterStub {
    /// May be empty when the source prints no title
    pub title: String,
    pub url: Url,
    pub published_at: DateTime<Utc>,
}

/// Parses a fetched body as an HTML document
///
/// HTML parsing itself is forgiving; a body is rejected only when it is
/// empty or carries no element tags at all.
pub fn parse_document(url: &str, body: &str) -> Result<Html, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError {
            url: url.to_string(),
            message: "empty document".to_string(),
        });
    }

    if !body.contains('<') {
        return Err(ParseError {
            url: url.to_string(),
            message: "document contains no markup".to_string(),
        });
    }

    Ok(Html::parse_document(body))
}

/// Extracts the novel rows of a listing page
///
/// Rows without a title or without a resolvable detail link are skipped.
pub fn extract_listing(
    document: &Html,
    selectors: &CompiledListingSelectors,
    base_url: &Url,
) -> Vec<ListingEntry> {
    let mut entries = Vec::new();

    for row in document.select(&selectors.list) {
        let Some(title) = first_text(row, &selectors.title) else {
            tracing::trace!("Skipping listing row without a title");
            continue;
        };

        let Some(url) = first_attr(row, &selectors.detail_link, &["href"])
            .and_then(|href| resolve_link(&href, base_url))
        else {
            tracing::trace!(title = %title, "Skipping listing row without a detail link");
            continue;
        };

        let cover_url = first_attr(row, &selectors.cover, &["src", "data-src"])
            .and_then(|src| resolve_link(&src, base_url))
            .map(|u| u.to_string());

        entries.push(ListingEntry {
            title,
            cover_url,
            author: first_text(row, &selectors.author),
            url,
        });
    }

    entries
}

/// Extracts the metadata fields of a detail page
pub fn extract_detail(document: &Html, selectors: &CompiledDetailSelectors) -> DetailFields {
    let root = document.root_element();

    let genres = document
        .select(&selectors.genres)
        .filter_map(element_text)
        .collect();

    DetailFields {
        description: first_text(root, &selectors.description),
        genres,
        status: first_text(root, &selectors.status),
        rating: first_text(root, &selectors.rating),
    }
}

/// Extracts the chapter index of a detail page in document order
///
/// Rows without a resolvable chapter link are skipped. Numbering is left to
/// the caller, since sources usually list newest first.
pub fn extract_chapter_stubs(
    document: &Html,
    selectors: &CompiledDetailSelectors,
    base_url: &Url,
) -> Vec<ChapterStub> {
    let now = Utc::now();
    let mut stubs = Vec::new();

    for row in document.select(&selectors.chapter_list) {
        let Some(url) = first_attr(row, &selectors.chapter_link, &["href"])
            .and_then(|href| resolve_link(&href, base_url))
        else {
            continue;
        };

        let date_text = first_text(row, &selectors.chapter_date).unwrap_or_default();

        stubs.push(ChapterStub {
            title: first_text(row, &selectors.chapter_title).unwrap_or_default(),
            url,
            published_at: parse_chapter_date_at(&date_text, now),
        });
    }

    stubs
}

/// Extracts a chapter body, keeping paragraph breaks
///
/// Returns `None` when the content selector matches nothing or only whitespace.
pub fn extract_chapter_content(
    document: &Html,
    selectors: &CompiledChapterSelectors,
) -> Option<String> {
    let container = document.select(&selectors.content).next()?;

    let paragraphs: Vec<String> = Selector::parse("p")
        .ok()
        .map(|p| container.select(&p).filter_map(element_text).collect())
        .unwrap_or_default();

    if paragraphs.is_empty() {
        element_text(container)
    } else {
        Some(paragraphs.join("\n\n"))
    }
}

/// Text of an element with whitespace runs collapsed; `None` when blank
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    (!text.is_empty()).then_some(text)
}

/// Text of the first non-blank match of `selector` under `scope`
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).find_map(element_text)
}

/// First non-blank value among `attrs` on the first match of `selector`
///
/// A selector may also match `scope` itself, so that a row that is its
/// own link (`a.novel-item`) still works.
fn first_attr(scope: ElementRef<'_>, selector: &Selector, attrs: &[&str]) -> Option<String> {
    let element = if selector.matches(&scope) {
        scope
    } else {
        scope.select(selector).next()?
    };

    attrs
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CompiledSource, SourceDefinition};
    use chrono::{Datelike, TimeZone};

    fn source() -> CompiledSource {
        CompiledSource::compile(&SourceDefinition::light_novel_world()).unwrap()
    }

    const LISTING: &str = r#"
        <html><body><ul class="novel-list">
          <li class="novel-item">
            <div class="novel-cover"><img src="/covers/shadow.jpg"></div>
            <h4 class="novel-title"><a href="/novel/shadow-slave">  Shadow   Slave </a></h4>
            <div class="novel-author">Guiltythree</div>
          </li>
          <li class="novel-item">
            <div class="novel-cover"><img data-src="https://cdn.example.com/c.jpg"></div>
            <h4 class="novel-title"><a href="/novel/lotm?utm_source=home">Lord of the Mysteries</a></h4>
          </li>
          <li class="novel-item">
            <h4 class="novel-title"><a>No Link Here</a></h4>
          </li>
          <li class="novel-item">
            <h4 class="novel-title"><a href="/novel/untitled">   </a></h4>
          </li>
        </ul></body></html>
    "#;

    const DETAIL: &str = r#"
        <html><body>
          <div class="header-stats">
            <span class="rating"><strong>4.7</strong><small>Rating</small></span>
            <span class="status"><strong>Ongoing</strong><small>Status</small></span>
          </div>
          <div class="categories"><a>Fantasy</a><a> Action </a><a></a></div>
          <div class="summary"><p>Growing up in poverty,</p><p>Sunny never expected anything good.</p></div>
          <ul class="chapter-list">
            <li><a href="/novel/shadow-slave/chapter-3">Chapter 3</a><time class="chapter-date">2 hours ago</time></li>
            <li><a href="/novel/shadow-slave/chapter-2">Chapter 2</a><time class="chapter-date">Mar 5, 2023</time></li>
            <li><span>locked</span></li>
            <li><a href="/novel/shadow-slave/chapter-1"></a><time class="chapter-date">???</time></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_parse_document_rejects_non_markup() {
        assert!(parse_document("https://x", "").is_err());
        assert!(parse_document("https://x", "   \n").is_err());
        assert!(parse_document("https://x", "just some words").is_err());
        assert!(parse_document("https://x", "<p>fine</p>").is_ok());
    }

    #[test]
    fn test_extract_listing() {
        let source = source();
        let document = parse_document("https://x", LISTING).unwrap();
        let entries = extract_listing(&document, &source.listing, &source.base_url);

        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Shadow Slave");
        assert_eq!(entries[0].author.as_deref(), Some("Guiltythree"));
        assert_eq!(
            entries[0].url.as_str(),
            "https://www.lightnovelworld.com/novel/shadow-slave"
        );
        assert_eq!(
            entries[0].cover_url.as_deref(),
            Some("https://www.lightnovelworld.com/covers/shadow.jpg")
        );

        assert_eq!(entries[1].title, "Lord of the Mysteries");
        assert_eq!(entries[1].author, None);
        assert_eq!(
            entries[1].url.as_str(),
            "https://www.lightnovelworld.com/novel/lotm"
        );
        assert_eq!(
            entries[1].cover_url.as_deref(),
            Some("https://cdn.example.com/c.jpg")
        );
    }

    #[test]
    fn test_extract_detail() {
        let source = source();
        let document = parse_document("https://x", DETAIL).unwrap();
        let detail = extract_detail(&document, &source.detail);

        assert_eq!(
            detail.description.as_deref(),
            Some("Growing up in poverty, Sunny never expected anything good.")
        );
        assert_eq!(detail.genres, vec!["Fantasy", "Action"]);
        assert_eq!(detail.status.as_deref(), Some("Ongoing"));
        assert_eq!(detail.rating.as_deref(), Some("4.7"));
    }

    #[test]
    fn test_extract_detail_missing_fields() {
        let source = source();
        let document = parse_document("https://x", "<html><body><h1>Bare</h1></body></html>").unwrap();
        assert_eq!(extract_detail(&document, &source.detail), DetailFields::default());
    }

    #[test]
    fn test_extract_chapter_stubs_keeps_document_order() {
        let source = source();
        let document = parse_document("https://x", DETAIL).unwrap();
        let stubs = extract_chapter_stubs(&document, &source.detail, &source.base_url);

        assert_eq!(stubs.len(), 3);
        assert_eq!(stubs[0].title, "Chapter 3");
        assert_eq!(stubs[1].title, "Chapter 2");
        assert_eq!(stubs[2].title, "");
        assert_eq!(
            stubs[2].url.as_str(),
            "https://www.lightnovelworld.com/novel/shadow-slave/chapter-1"
        );

        let dated = stubs[1].published_at;
        assert_eq!((dated.year(), dated.month(), dated.day()), (2023, 3, 5));
        assert!(Utc::now() - stubs[0].published_at < chrono::Duration::seconds(5));
        assert!(stubs[2].published_at > Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_extract_chapter_content() {
        let source = source();
        let selectors = source.chapter.as_ref().unwrap();

        let html = r#"<div id="chapter-container"><p>First line.</p><p>  Second   line. </p></div>"#;
        let document = parse_document("https://x", html).unwrap();
        assert_eq!(
            extract_chapter_content(&document, selectors).as_deref(),
            Some("First line.\n\nSecond line.")
        );

        let plain = parse_document("https://x", r#"<div id="chapter-container">Only text</div>"#).unwrap();
        assert_eq!(
            extract_chapter_content(&plain, selectors).as_deref(),
            Some("Only text")
        );

        let missing = parse_document("https://x", "<div>nothing</div>").unwrap();
        assert_eq!(extract_chapter_content(&missing, selectors), None);
    }

    #[test]
    fn test_row_that_is_its_own_link() {
        let mut definition = SourceDefinition::light_novel_world();
        definition.listing.list = "a.novel-item".to_string();
        definition.listing.title = ".title".to_string();
        definition.listing.detail_link = "a.novel-item".to_string();
        let source = CompiledSource::compile(&definition).unwrap();

        let html = r#"<a class="novel-item" href="/novel/x"><span class="title">X</span></a>"#;
        let document = parse_document("https://x", html).unwrap();
        let entries = extract_listing(&document, &source.listing, &source.base_url);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url.as_str(), "https://www.lightnovelworld.com/novel/x");
    }
}
