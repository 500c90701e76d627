//! DOM query capability over a parsed HTML document.
//!
//! [`HtmlDom`] wraps a scraper document. Static HTML has no layout, so
//! bounding boxes come from an optional layout map measured in the live
//! page: selector → boxes of its matches in document order.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::types::Rect;

/// One element in a document.
pub trait DomNode: Sized {
    /// Lower-case tag name.
    fn tag(&self) -> String;
    /// Text content with whitespace runs collapsed.
    fn text(&self) -> String;
    fn attr(&self, name: &str) -> Option<String>;
    /// Bounding box, if layout is known.
    fn bounds(&self) -> Option<Rect>;
    /// Descendants matching `selector`, in document order.
    fn select(&self, selector: &str) -> Vec<Self>;
    fn outer_html(&self) -> String;

    /// Number of descendants matching `selector`.
    fn count(&self, selector: &str) -> usize {
        self.select(selector).len()
    }

    /// Whether any descendant matches `selector`.
    fn contains(&self, selector: &str) -> bool {
        self.count(selector) > 0
    }
}

/// A document that answers CSS selector queries.
pub trait DomQuery {
    type Node<'a>: DomNode
    where
        Self: 'a;

    /// Elements matching `selector`, in document order. Invalid selectors match nothing.
    fn select(&self, selector: &str) -> Vec<Self::Node<'_>>;
}

/// Bounding boxes per selector, in match order.
pub type LayoutMap = HashMap<String, Vec<Rect>>;

/// A parsed HTML snapshot.
pub struct HtmlDom {
    document: Html,
    layout: LayoutMap,
}

impl HtmlDom {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            layout: LayoutMap::new(),
        }
    }

    /// Attach bounding boxes measured in the rendered page.
    pub fn with_layout(mut self, layout: LayoutMap) -> Self {
        self.layout = layout;
        self
    }
}

impl DomQuery for HtmlDom {
    type Node<'a> = HtmlNode<'a>;

    fn select(&self, selector: &str) -> Vec<HtmlNode<'_>> {
        let Some(parsed) = parse_selector(selector) else {
            return Vec::new();
        };
        let boxes = self.layout.get(selector);
        self.document
            .select(&parsed)
            .enumerate()
            .map(|(i, element)| HtmlNode {
                element,
                bounds: boxes.and_then(|b| b.get(i).copied()),
            })
            .collect()
    }
}

/// An element of an [`HtmlDom`].
#[derive(Clone, Copy)]
pub struct HtmlNode<'a> {
    element: ElementRef<'a>,
    bounds: Option<Rect>,
}

impl DomNode for HtmlNode<'_> {
    fn tag(&self) -> String {
        self.element.value().name().to_ascii_lowercase()
    }

    fn text(&self) -> String {
        let raw: String = self.element.text().collect();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(String::from)
    }

    fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    fn select(&self, selector: &str) -> Vec<Self> {
        let Some(parsed) = parse_selector(selector) else {
            return Vec::new();
        };
        self.element
            .select(&parsed)
            .map(|element| HtmlNode {
                element,
                bounds: None,
            })
            .collect()
    }

    fn outer_html(&self) -> String {
        self.element.html()
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::debug!("Ignoring unparseable selector: {selector}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="toolbar">
            <button class="btn primary">  Save
               changes </button>
            <button><svg></svg>Delete</button>
          </div>
          <p>outside</p>
        </body></html>
    "#;

    #[test]
    fn test_select_in_document_order() {
        let dom = HtmlDom::parse(PAGE);
        let buttons = dom.select("button");
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].text(), "Save changes");
        assert_eq!(buttons[1].text(), "Delete");
        assert_eq!(buttons[0].attr("class").as_deref(), Some("btn primary"));
        assert_eq!(buttons[0].tag(), "button");
    }

    #[test]
    fn test_nested_select_excludes_self() {
        let dom = HtmlDom::parse(PAGE);
        let toolbars = dom.select("div.toolbar");
        let toolbar = &toolbars[0];
        assert_eq!(toolbar.count("button"), 2);
        assert!(toolbar.contains("svg"));
        assert!(!toolbar.contains("p"));
        assert_eq!(toolbar.count("div"), 0);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let dom = HtmlDom::parse(PAGE);
        assert!(dom.select("button[").is_empty());
    }

    #[test]
    fn test_layout_attached_by_index() {
        let rect = Rect {
            x: 1.0,
            y: 2.0,
            width: 80.0,
            height: 32.0,
        };
        let mut layout = LayoutMap::new();
        layout.insert("button".to_string(), vec![rect]);
        let dom = HtmlDom::parse(PAGE).with_layout(layout);

        let buttons = dom.select("button");
        assert_eq!(buttons[0].bounds(), Some(rect));
        assert_eq!(buttons[1].bounds(), None);
        assert!(dom.select("div.toolbar")[0].bounds().is_none());
    }
}
