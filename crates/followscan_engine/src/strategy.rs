use std::collections::BTreeSet;

use ego_tree::NodeRef;
use followscan_core::Platform;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::PageError;

const TWITTER_USER_CELL: &str = r#"[data-testid="UserCell"]"#;

/// Per-platform extraction logic, selected by [`Platform`].
///
/// Strategies only read the document they are given, so they can be invoked
/// repeatedly against successive renders of a mutating page.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// User cells carry the handle as the first `@`-prefixed text node.
    Twitter { cell: Selector },
}

impl Strategy {
    pub fn for_platform(platform: Platform) -> Result<Self, PageError> {
        match platform {
            Platform::Twitter => Ok(Strategy::Twitter {
                cell: parse_selector(TWITTER_USER_CELL)?,
            }),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Strategy::Twitter { .. } => Platform::Twitter,
        }
    }

    /// Currently rendered candidate elements.
    pub fn candidates<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        match self {
            Strategy::Twitter { cell } => doc.select(cell).collect(),
        }
    }

    /// Canonical identifier for one candidate, or `None` if it has none.
    pub fn identifier(&self, element: ElementRef<'_>) -> Option<String> {
        match self {
            Strategy::Twitter { .. } => first_sigil_handle(element, '@'),
        }
    }

    /// Parse `html` and add every accepted identifier to `into`.
    /// Returns how many candidates were rendered.
    pub fn scan(&self, html: &str, into: &mut BTreeSet<String>) -> usize {
        let doc = Html::parse_document(html);
        let candidates = self.candidates(&doc);
        let rendered = candidates.len();
        into.extend(candidates.into_iter().filter_map(|el| self.identifier(el)));
        rendered
    }
}

fn parse_selector(raw: &str) -> Result<Selector, PageError> {
    Selector::parse(raw).map_err(|err| PageError::Selector(format!("{raw}: {err:?}")))
}

fn first_sigil_handle(element: ElementRef<'_>, sigil: char) -> Option<String> {
    element
        .descendants()
        .filter_map(text_of)
        .filter_map(|text| text.trim().strip_prefix(sigil))
        .map(str::to_lowercase)
        .find(|handle| is_handle(handle))
}

fn text_of<'a>(node: NodeRef<'a, Node>) -> Option<&'a str> {
    match node.value() {
        Node::Text(text) => Some(&**text),
        _ => None,
    }
}

fn is_handle(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
