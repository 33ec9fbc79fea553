/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page snapshots ("memories") produced by the scraping collaborator.

use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on the body excerpt carried by a webpage memory, in chars.
pub const BODY_EXCERPT_MAX_CHARS: usize = 2000;
/// Upper bound on the number of outbound links kept per memory.
pub const LINKS_MAX: usize = 10;
/// Body used for PDFs whose text layer yielded nothing readable.
pub const PDF_UNREADABLE_BODY: &str = "Could not extract readable text from this PDF";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Webpage,
    Pdf,
}

/// Immutable snapshot of a page, as sent to `POST /memory/save`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedMemory {
    pub title: String,
    pub body_text: String,
    pub links: Vec<String>,
    pub url: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl ScrapedMemory {
    /// Build a webpage memory from raw scraped parts, applying the excerpt
    /// and link bounds.
    pub fn webpage(
        title: impl Into<String>,
        body_text: &str,
        links: impl IntoIterator<Item = String>,
        url: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        let title = title.into();
        Self {
            title: if title.trim().is_empty() {
                "Untitled Page".to_string()
            } else {
                title
            },
            body_text: bounded_excerpt(body_text, BODY_EXCERPT_MAX_CHARS),
            links: links
                .into_iter()
                .filter(|href| href.starts_with("http"))
                .take(LINKS_MAX)
                .collect(),
            url: url.into(),
            timestamp,
            kind: MemoryKind::Webpage,
            page_count: None,
        }
    }

    /// Build a PDF memory from an uploaded file name and its extracted text.
    pub fn pdf(file_name: &str, extracted_text: &str, page_count: u32, timestamp: u64) -> Self {
        let title = file_name
            .strip_suffix(".pdf")
            .unwrap_or(file_name)
            .to_string();
        let body_text = if extracted_text.trim().is_empty() {
            PDF_UNREADABLE_BODY.to_string()
        } else {
            bounded_excerpt(extracted_text, BODY_EXCERPT_MAX_CHARS)
        };
        Self {
            title,
            body_text,
            links: Vec::new(),
            url: format!("file://{file_name}"),
            timestamp,
            kind: MemoryKind::Pdf,
            page_count: Some(page_count),
        }
    }

    /// Host part of the memory URL, falling back to the raw URL when it does
    /// not parse or has no host (e.g. `file://` PDFs).
    pub fn hostname(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    /// One-line label used by the Memory tab list.
    pub fn list_label(&self) -> String {
        format!("{} ({})", self.title, self.hostname())
    }
}

fn bounded_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
