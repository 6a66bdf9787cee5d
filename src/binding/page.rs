//! HTML page host.
//!
//! Discovers mosaic elements in static HTML markup so pages can be rendered
//! outside a browser. Only start tags are inspected; an element qualifies
//! when it carries a `data-pruner` attribute.
//!
//! ```text
//! <img id="hero" data-pruner='{"name": "harbour", "tile": "14 8", "path": "/t/"}'>
//! <div data-pruner="{&quot;name&quot;: &quot;map&quot;, ...}"></div>   → id "pruner-2"
//! ```
//!
//! Attribute values may be double-quoted, single-quoted or bare. Common
//! character references are decoded. Elements without an `id` get a
//! positional one, `pruner-{n}`, counting discovered elements from 1.
//!
//! Markup the browser never turns into live elements is skipped: comments,
//! the bodies of `script`, `style`, `textarea` and `title`, and `template`
//! contents. An unterminated comment or raw-text element hides the rest of
//! the document, as it would in a browser.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tracing::{debug, warn};

use super::element::HostElement;
use crate::descriptor::DESCRIPTOR_ATTRIBUTE;
use crate::render::PublishedImage;

static START_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r#"<([A-Za-z][A-Za-z0-9:-]*)((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/?>"#)
});

static INERT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(concat!(
        r"(?is)<!--.*?(?:-->|\z)",
        r"|<script\b[^>]*>.*?(?:</script\s*>|\z)",
        r"|<style\b[^>]*>.*?(?:</style\s*>|\z)",
        r"|<textarea\b[^>]*>.*?(?:</textarea\s*>|\z)",
        r"|<title\b[^>]*>.*?(?:</title\s*>|\z)",
        r"|<template\b[^>]*>.*?(?:</template\s*>|\z)",
    ))
});

static ATTRIBUTE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
});

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Failed to compile page pattern: {}", e);
            None
        }
    }
}

// =============================================================================
// Page Element
// =============================================================================

/// An element discovered in HTML markup.
#[derive(Debug)]
pub struct PageElement {
    id: String,
    tag: String,
    attributes: HashMap<String, String>,
    published: Mutex<Option<PublishedImage>>,
}

impl PageElement {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, attributes: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            attributes,
            published: Mutex::new(None),
        }
    }

    /// Lower-cased tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The most recently published composite, if any.
    pub fn published(&self) -> Option<PublishedImage> {
        match self.published.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HostElement for PageElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    fn publish(&self, image: PublishedImage) {
        let mut slot = match self.published.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(image);
    }
}

// =============================================================================
// Page
// =============================================================================

/// The mosaic elements of one HTML document, in document order.
#[derive(Debug, Default)]
pub struct HtmlPage {
    elements: Vec<Arc<PageElement>>,
}

impl HtmlPage {
    /// Discover every element carrying a descriptor attribute.
    pub fn parse(html: &str) -> Self {
        let (Some(start_tag), Some(attribute), Some(inert)) =
            (START_TAG.as_ref(), ATTRIBUTE.as_ref(), INERT.as_ref())
        else {
            return Self::default();
        };

        let live = inert.replace_all(html, " ");
        let mut elements = Vec::new();

        for tag in start_tag.captures_iter(&live) {
            let name = tag[1].to_ascii_lowercase();
            let attrs_src = tag.get(2).map(|m| m.as_str()).unwrap_or("");

            let mut attributes = HashMap::new();
            for attr in attribute.captures_iter(attrs_src) {
                let key = attr[1].to_ascii_lowercase();
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map(|m| decode_entities(m.as_str()))
                    .unwrap_or_default();
                // First occurrence wins, as in HTML
                attributes.entry(key).or_insert(value);
            }

            if !attributes.contains_key(DESCRIPTOR_ATTRIBUTE) {
                continue;
            }

            let id = match attributes.get("id").filter(|id| !id.trim().is_empty()) {
                Some(id) => id.clone(),
                None => format!("pruner-{}", elements.len() + 1),
            };

            debug!(element = %id, tag = %name, "discovered mosaic element");
            elements.push(Arc::new(PageElement::new(id, name, attributes)));
        }

        Self { elements }
    }

    /// Discovered elements in document order.
    pub fn elements(&self) -> &[Arc<PageElement>] {
        &self.elements
    }

    /// Discovered elements as host elements, ready for binding.
    pub fn host_elements(&self) -> Vec<Arc<dyn HostElement>> {
        self.elements
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn HostElement>)
            .collect()
    }

    /// Look up an element by id.
    pub fn get(&self, id: &str) -> Option<&Arc<PageElement>> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Decode the character references that appear in attribute values.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
