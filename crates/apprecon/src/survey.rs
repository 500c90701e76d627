//! Page component surveyor — structural summaries of the UI on one screen.
//!
//! Classification is selector-driven and deliberately approximate: each
//! component category has an allow-list of CSS selectors ([`SelectorSet`])
//! and every match becomes a summary. The page is only read.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, DomQuery};
use crate::types::NavLink;

/// Character cap for button and input label excerpts.
const TEXT_EXCERPT_CHARS: usize = 100;

/// Character cap for table headers and navigation link texts.
const SHORT_EXCERPT_CHARS: usize = 50;

/// Links kept per navigation block.
const NAV_BLOCK_LINK_LIMIT: usize = 20;

/// Inline SVGs larger than this are not kept as icons.
pub const MAX_ICON_MARKUP: usize = 5000;

/// Icons kept per page.
pub const MAX_ICONS: usize = 100;

/// Links that make up a site's primary navigation.
pub const NAV_LINK_SELECTOR: &str =
    r#"nav a, [class*="sidebar"] a, [class*="menu"] a, [role="navigation"] a"#;

/// Component categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Button,
    Input,
    Form,
    Table,
    Card,
    Navigation,
    Modal,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Button,
        ComponentKind::Input,
        ComponentKind::Form,
        ComponentKind::Table,
        ComponentKind::Card,
        ComponentKind::Navigation,
        ComponentKind::Modal,
    ];

    fn default_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Button => &[
                "button",
                r#"[role="button"]"#,
                r#"a[class*="btn"]"#,
                r#"[class*="button"]"#,
            ],
            Self::Input => &["input", "select", "textarea"],
            Self::Form => &["form"],
            Self::Table => &["table", r#"[role="table"]"#, r#"[class*="table"]"#],
            Self::Card => &[r#"[class*="card"]"#, r#"[class*="Card"]"#],
            Self::Navigation => &[
                "nav",
                r#"[role="navigation"]"#,
                r#"[class*="sidebar"]"#,
                r#"[class*="menu"]"#,
            ],
            Self::Modal => &[
                r#"[role="dialog"]"#,
                r#"[class*="modal"]"#,
                r#"[class*="Modal"]"#,
            ],
        }
    }
}

/// Per-category selector allow-lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    selectors: BTreeMap<ComponentKind, Vec<String>>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        let selectors = ComponentKind::ALL
            .iter()
            .map(|kind| {
                let list = kind
                    .default_selectors()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                (*kind, list)
            })
            .collect();
        Self { selectors }
    }
}

impl SelectorSet {
    /// Add a selector to a category. Duplicates are ignored.
    pub fn add(&mut self, kind: ComponentKind, selector: impl Into<String>) {
        let selector = selector.into();
        let list = self.selectors.entry(kind).or_default();
        if !list.contains(&selector) {
            list.push(selector);
        }
    }

    /// The combined selector list for a category, e.g. `"form"`.
    pub fn selector(&self, kind: ComponentKind) -> String {
        self.selectors
            .get(&kind)
            .map(|list| list.join(", "))
            .unwrap_or_default()
    }

    /// Combined selectors for every category, in category order.
    pub fn combined(&self) -> Vec<String> {
        ComponentKind::ALL
            .iter()
            .map(|kind| self.selector(*kind))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonSummary {
    pub text: String,
    pub classes: Vec<String>,
    /// Button type (`submit`, `button`, `reset`, ...).
    pub kind: String,
    pub size: Option<Size>,
    pub has_icon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    /// Control type as the DOM reports it (`text`, `email`, `select-one`, `textarea`, ...).
    pub kind: String,
    pub name: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub classes: Vec<String>,
    /// Text of the `<label for=...>` pointing at this control.
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    /// Resolved submission URL.
    pub action: String,
    pub method: String,
    pub input_count: usize,
    pub input_types: Vec<String>,
    pub button_count: usize,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub has_image: bool,
    pub has_title: bool,
    pub has_actions: bool,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSummary {
    pub link_count: usize,
    /// First links of the block.
    pub links: Vec<NavLink>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalSummary {
    pub has_close: bool,
    pub has_title: bool,
    pub has_form: bool,
    pub classes: Vec<String>,
}

/// Everything the surveyor found on one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSurvey {
    pub buttons: Vec<ButtonSummary>,
    pub inputs: Vec<InputSummary>,
    pub forms: Vec<FormSummary>,
    pub tables: Vec<TableSummary>,
    pub cards: Vec<CardSummary>,
    pub navigation: Vec<NavigationSummary>,
    pub modals: Vec<ModalSummary>,
}

impl ComponentSurvey {
    pub fn count(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Button => self.buttons.len(),
            ComponentKind::Input => self.inputs.len(),
            ComponentKind::Form => self.forms.len(),
            ComponentKind::Table => self.tables.len(),
            ComponentKind::Card => self.cards.len(),
            ComponentKind::Navigation => self.navigation.len(),
            ComponentKind::Modal => self.modals.len(),
        }
    }

    pub fn total(&self) -> usize {
        ComponentKind::ALL.iter().map(|k| self.count(*k)).sum()
    }
}

/// Image and icon references found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInventory {
    pub images: Vec<String>,
    /// Inline SVG markup.
    pub icons: Vec<String>,
}

/// Extracts a [`ComponentSurvey`] from any [`DomQuery`].
#[derive(Debug, Clone, Default)]
pub struct Surveyor {
    selectors: SelectorSet,
}

impl Surveyor {
    pub fn new(selectors: SelectorSet) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    /// Survey every category on the page at `page_url`.
    pub fn survey<D: DomQuery>(&self, dom: &D, page_url: &str) -> ComponentSurvey {
        ComponentSurvey {
            buttons: self.matches(dom, ComponentKind::Button)
                .iter()
                .map(summarize_button)
                .collect(),
            inputs: self.matches(dom, ComponentKind::Input)
                .iter()
                .map(|el| summarize_input(dom, el))
                .collect(),
            forms: self.matches(dom, ComponentKind::Form)
                .iter()
                .map(|el| summarize_form(el, page_url))
                .collect(),
            tables: self.matches(dom, ComponentKind::Table)
                .iter()
                .map(summarize_table)
                .collect(),
            cards: self.matches(dom, ComponentKind::Card)
                .iter()
                .map(|el| CardSummary {
                    has_image: el.contains("img"),
                    has_title: el.contains(r#"h1, h2, h3, h4, [class*="title"]"#),
                    has_actions: el.contains("button, a"),
                    classes: classes(el),
                })
                .collect(),
            navigation: self.matches(dom, ComponentKind::Navigation)
                .iter()
                .map(|el| summarize_navigation(el, page_url))
                .collect(),
            modals: self.matches(dom, ComponentKind::Modal)
                .iter()
                .map(|el| ModalSummary {
                    has_close: el.contains(r#"[class*="close"], button"#),
                    has_title: el.contains(r#"h1, h2, h3, [class*="title"]"#),
                    has_form: el.contains("form"),
                    classes: classes(el),
                })
                .collect(),
        }
    }

    fn matches<'d, D: DomQuery>(&self, dom: &'d D, kind: ComponentKind) -> Vec<D::Node<'d>> {
        dom.select(&self.selectors.selector(kind))
    }
}

fn summarize_button<N: DomNode>(el: &N) -> ButtonSummary {
    let kind = match el.tag().as_str() {
        "button" => el.attr("type").unwrap_or_else(|| "submit".to_string()),
        "input" => el.attr("type").unwrap_or_else(|| "text".to_string()),
        _ => "button".to_string(),
    };

    ButtonSummary {
        text: excerpt(&el.text(), TEXT_EXCERPT_CHARS),
        classes: classes(el),
        kind: kind.to_ascii_lowercase(),
        size: el.bounds().map(|r| Size {
            width: r.width,
            height: r.height,
        }),
        has_icon: el.contains(r#"svg, img, [class*="icon"]"#),
    }
}

fn summarize_input<D: DomQuery, N: DomNode>(dom: &D, el: &N) -> InputSummary {
    let label = el
        .attr("id")
        .filter(|id| !id.is_empty())
        .and_then(|id| {
            dom.select(&format!(r#"label[for="{}"]"#, css_string(&id)))
                .first()
                .map(|label| excerpt(&label.text(), TEXT_EXCERPT_CHARS))
        });

    InputSummary {
        kind: control_kind(el),
        name: el.attr("name"),
        placeholder: el.attr("placeholder"),
        required: el.attr("required").is_some(),
        classes: classes(el),
        label,
    }
}

fn summarize_form<N: DomNode>(el: &N, page_url: &str) -> FormSummary {
    let action = match el.attr("action").filter(|a| !a.trim().is_empty()) {
        Some(raw) => resolve(page_url, raw.trim()),
        None => page_url.to_string(),
    };
    let method = match el.attr("method").map(|m| m.to_ascii_lowercase()) {
        Some(m) if m == "post" || m == "dialog" => m,
        _ => "get".to_string(),
    };
    let inputs = el.select("input, select, textarea");

    FormSummary {
        action,
        method,
        input_count: inputs.len(),
        input_types: inputs.iter().map(control_kind).collect(),
        button_count: el.count(r#"button, [type="submit"]"#),
        classes: classes(el),
    }
}

fn summarize_table<N: DomNode>(el: &N) -> TableSummary {
    TableSummary {
        headers: el
            .select(r#"th, [role="columnheader"]"#)
            .iter()
            .map(|h| excerpt(&h.text(), SHORT_EXCERPT_CHARS))
            .collect(),
        row_count: el.count(r#"tr, [role="row"]"#),
        classes: classes(el),
    }
}

fn summarize_navigation<N: DomNode>(el: &N, page_url: &str) -> NavigationSummary {
    let links = el.select("a");
    NavigationSummary {
        link_count: links.len(),
        links: links
            .iter()
            .take(NAV_BLOCK_LINK_LIMIT)
            .map(|a| NavLink {
                text: excerpt(&a.text(), SHORT_EXCERPT_CHARS),
                href: a
                    .attr("href")
                    .map(|h| resolve(page_url, h.trim()))
                    .unwrap_or_default(),
                has_icon: a.contains("svg"),
            })
            .collect(),
        classes: classes(el),
    }
}

/// Navigation targets of a page: absolute `http(s)` links inside
/// navigation containers, de-duplicated by href in document order.
pub fn discover_navigation<D: DomQuery>(dom: &D, page_url: &str) -> Vec<NavLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in dom.select(NAV_LINK_SELECTOR) {
        let Some(raw) = a.attr("href") else {
            continue;
        };
        let href = resolve(page_url, raw.trim());
        if !href.starts_with("http") || !seen.insert(href.clone()) {
            continue;
        }
        links.push(NavLink {
            text: a.text(),
            href,
            has_icon: a.contains("svg"),
        });
    }

    links
}

/// Image sources and small inline SVG icons on a page.
pub fn collect_assets<D: DomQuery>(dom: &D, page_url: &str) -> AssetInventory {
    let mut inventory = AssetInventory::default();

    let mut seen_images = HashSet::new();
    for img in dom.select("img[src]") {
        if let Some(src) = img.attr("src").filter(|s| !s.trim().is_empty()) {
            let src = resolve(page_url, src.trim());
            if seen_images.insert(src.clone()) {
                inventory.images.push(src);
            }
        }
    }

    let mut seen_icons = HashSet::new();
    for svg in dom.select("svg") {
        if inventory.icons.len() >= MAX_ICONS {
            break;
        }
        let markup = svg.outer_html();
        if markup.len() < MAX_ICON_MARKUP && seen_icons.insert(markup.clone()) {
            inventory.icons.push(markup);
        }
    }

    inventory
}

/// Control type the way `HTMLInputElement.type` reports it.
fn control_kind<N: DomNode>(el: &N) -> String {
    match el.tag().as_str() {
        "input" => el
            .attr("type")
            .map(|t| t.to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string()),
        "select" if el.attr("multiple").is_some() => "select-multiple".to_string(),
        "select" => "select-one".to_string(),
        other => other.to_string(),
    }
}

fn classes<N: DomNode>(el: &N) -> Vec<String> {
    el.attr("class")
        .map(|c| c.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

/// First `max_chars` characters of `text`.
fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Resolve `href` against `base`, leaving it untouched if either fails to parse.
fn resolve(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Escape a value for use inside a double-quoted CSS string.
fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDom;

    const BASE: &str = "https://app.example.com/calendar";

    const PAGE: &str = r##"
    <html><body>
      <nav class="sidebar">
        <a href="/calendar"><svg></svg>Calendar</a>
        <a href="/clients">Clients</a>
        <a href="https://app.example.com/clients">Clients again</a>
        <a href="mailto:help@example.com">Help</a>
        <a href="#top">Top</a>
      </nav>
      <main>
        <button class="btn btn-primary" type="button"><i class="icon-plus"></i> New appointment</button>
        <div role="button">Today</div>
        <form action="/api/bookings" method="POST" class="booking-form">
          <label for="client-name">Client name</label>
          <input id="client-name" name="client" placeholder="Search client" required>
          <input type="email" name="email">
          <select name="service"><option>Cut</option></select>
          <textarea name="notes"></textarea>
          <button>Book</button>
        </form>
        <table class="data">
          <tr><th>Time</th><th>Client</th></tr>
          <tr><td>09:00</td><td>Jane</td></tr>
          <tr><td>10:00</td><td>John</td></tr>
        </table>
        <div class="card"><img src="/a.png"><h3>Staff</h3><a href="/staff/1">Open</a></div>
        <div class="card plain">Empty</div>
        <div role="dialog" class="modal"><h2>Confirm</h2><button class="close">x</button></div>
      </main>
    </body></html>
    "##;

    fn survey() -> ComponentSurvey {
        Surveyor::default().survey(&HtmlDom::parse(PAGE), BASE)
    }

    #[test]
    fn test_buttons() {
        let s = survey();
        // Two in main, one inside the form, one close button in the modal.
        assert_eq!(s.buttons.len(), 4);
        let new = &s.buttons[0];
        assert_eq!(new.text, "New appointment");
        assert_eq!(new.kind, "button");
        assert!(new.has_icon);
        assert_eq!(new.classes, vec!["btn", "btn-primary"]);
        assert!(new.size.is_none());

        assert_eq!(s.buttons[1].text, "Today");
        assert_eq!(s.buttons[1].kind, "button");
        assert_eq!(s.buttons[2].kind, "submit");
    }

    #[test]
    fn test_inputs_with_labels() {
        let s = survey();
        assert_eq!(s.inputs.len(), 4);
        let client = &s.inputs[0];
        assert_eq!(client.kind, "text");
        assert_eq!(client.name.as_deref(), Some("client"));
        assert_eq!(client.placeholder.as_deref(), Some("Search client"));
        assert!(client.required);
        assert_eq!(client.label.as_deref(), Some("Client name"));

        let kinds: Vec<_> = s.inputs.iter().map(|i| i.kind.as_str()).collect();
        assert_eq!(kinds, vec!["text", "email", "select-one", "textarea"]);
    }

    #[test]
    fn test_forms() {
        let s = survey();
        assert_eq!(s.forms.len(), 1);
        let form = &s.forms[0];
        assert_eq!(form.action, "https://app.example.com/api/bookings");
        assert_eq!(form.method, "post");
        assert_eq!(form.input_count, 4);
        assert_eq!(form.button_count, 1);
        assert_eq!(form.classes, vec!["booking-form"]);
    }

    #[test]
    fn test_tables() {
        let s = survey();
        assert_eq!(s.tables.len(), 1);
        assert_eq!(s.tables[0].headers, vec!["Time", "Client"]);
        assert_eq!(s.tables[0].row_count, 3);
    }

    #[test]
    fn test_cards_and_modals() {
        let s = survey();
        assert_eq!(s.cards.len(), 2);
        assert!(s.cards[0].has_image && s.cards[0].has_title && s.cards[0].has_actions);
        assert!(!s.cards[1].has_image && !s.cards[1].has_actions);

        assert_eq!(s.modals.len(), 1);
        assert!(s.modals[0].has_close);
        assert!(s.modals[0].has_title);
        assert!(!s.modals[0].has_form);
    }

    #[test]
    fn test_navigation_block() {
        let s = survey();
        assert_eq!(s.navigation.len(), 1);
        let nav = &s.navigation[0];
        assert_eq!(nav.link_count, 5);
        assert_eq!(nav.links[0].href, "https://app.example.com/calendar");
        assert!(nav.links[0].has_icon);
        assert_eq!(s.total(), 4 + 4 + 1 + 1 + 2 + 1 + 1);
    }

    #[test]
    fn test_discover_navigation_dedupes_and_filters() {
        let links = discover_navigation(&HtmlDom::parse(PAGE), BASE);
        let hrefs: Vec<_> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "https://app.example.com/calendar",
                "https://app.example.com/clients",
                "https://app.example.com/calendar#top",
            ]
        );
        assert_eq!(links[1].text, "Clients");
    }

    #[test]
    fn test_excerpt_caps_characters() {
        let long = "ж".repeat(150);
        let page = format!("<button>{long}</button>");
        let s = Surveyor::default().survey(&HtmlDom::parse(&page), BASE);
        assert_eq!(s.buttons[0].text.chars().count(), TEXT_EXCERPT_CHARS);
    }

    #[test]
    fn test_extra_selectors() {
        let mut selectors = SelectorSet::default();
        selectors.add(ComponentKind::Modal, r#"[class*="drawer"]"#);
        selectors.add(ComponentKind::Modal, r#"[class*="drawer"]"#);
        assert_eq!(
            selectors.selector(ComponentKind::Modal).matches("drawer").count(),
            1
        );

        let page = r#"<div class="side-drawer"><form></form></div>"#;
        let s = Surveyor::new(selectors).survey(&HtmlDom::parse(page), BASE);
        assert_eq!(s.modals.len(), 1);
        assert!(s.modals[0].has_form);
    }

    #[test]
    fn test_collect_assets() {
        let page = r#"
          <img src="/logo.png"><img src="/logo.png"><img src="">
          <svg viewBox="0 0 1 1"><path d="M0"></path></svg>
          <svg viewBox="0 0 1 1"><path d="M0"></path></svg>
        "#;
        let assets = collect_assets(&HtmlDom::parse(page), BASE);
        assert_eq!(assets.images, vec!["https://app.example.com/logo.png"]);
        assert_eq!(assets.icons.len(), 1);
        assert!(assets.icons[0].starts_with("<svg"));
    }

    #[test]
    fn test_combined_selectors_cover_all_categories() {
        let combined = SelectorSet::default().combined();
        assert_eq!(combined.len(), ComponentKind::ALL.len());
        assert_eq!(combined[2], "form");
    }
}
