//! Queryable view over a parsed product page.
//!
//! Wraps `scraper::Html` so extractors only see the handful of operations they
//! need: elements by selector, trimmed text, attribute value and the
//! visible text of the whole page.

use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{ScrapeError, ScrapeResult};

/// Elements whose text content never renders on the page.
const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct ProductPage {
    document: Html,
    base_url: Option<Url>,
}

impl ProductPage {
    /// Parse a page. html5ever is lenient, so malformed markup still yields a
    /// tree; only binary payloads that were decoded as text are rejected.
    pub fn parse(html: &str, base_url: Option<Url>) -> ScrapeResult<Self> {
        if html.contains('\0') {
            return Err(ScrapeError::Parse(
                "response body is binary data, not an HTML document".to_string(),
            ));
        }

        Ok(Self {
            document: Html::parse_document(html),
            base_url,
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.document.select(selector).next()
    }

    pub fn select_all<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.document.select(selector)
    }

    pub fn text_of(element: ElementRef<'_>) -> String {
        element.text().collect::<String>().trim().to_string()
    }

    pub fn attr_of(element: ElementRef<'_>, name: &str) -> Option<String> {
        element.value().attr(name).map(|s| s.to_string())
    }

    /// Text under `<body>` the way `textContent` reads it: text nodes joined
    /// as-is, with no separator added between elements. Script and style
    /// bodies are skipped.
    pub fn visible_text(&self) -> String {
        let body = Selector::parse("body").ok();
        let root = match body.as_ref().and_then(|sel| self.document.select(sel).next()) {
            Some(body) => body,
            None => self.document.root_element(),
        };

        let mut out = String::new();
        for node in root.descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                .map(|name| HIDDEN_TEXT_PARENTS.contains(&name))
                .unwrap_or(false);
            if !hidden {
                out.push_str(text);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn tolerates_malformed_markup() {
        let page = ProductPage::parse("<div><h1>Unclosed <b>heading</div><p>", None).unwrap();
        let h1 = page.select_first(&sel("h1")).unwrap();
        assert_eq!(ProductPage::text_of(h1), "Unclosed heading");
    }

    #[test]
    fn empty_input_is_an_empty_document() {
        let page = ProductPage::parse("", None).unwrap();
        assert!(page.select_first(&sel("h1")).is_none());
        assert_eq!(page.visible_text(), "");
    }

    #[test]
    fn rejects_binary_payload() {
        let err = ProductPage::parse("\u{89}PNG\0\0\0\rIHDR", None).err().unwrap();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn text_is_trimmed_and_attributes_are_read() {
        let page = ProductPage::parse(
            r#"<h1>
                  Coffee Grinder
               </h1><img id="main" src="/g.jpg">"#,
            None,
        )
        .unwrap();
        let h1 = page.select_first(&sel("h1")).unwrap();
        assert_eq!(ProductPage::text_of(h1), "Coffee Grinder");

        let img = page.select_first(&sel("#main")).unwrap();
        assert_eq!(ProductPage::attr_of(img, "src").as_deref(), Some("/g.jpg"));
        assert_eq!(ProductPage::attr_of(img, "alt"), None);
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let page = ProductPage::parse(
            r#"<html><head><title>T</title></head><body>
                 <script>var price = "$1";</script>
                 <style>.x::after { content: "$2"; }</style>
                 <p>Now only</p><span>$3.50</span>
               </body></html>"#,
            None,
        )
        .unwrap();
        let text = page.visible_text();
        assert!(!text.contains("$1") && !text.contains("$2"), "{text:?}");
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), ["Now", "only", "$3.50"]);
    }

    #[test]
    fn visible_text_joins_inline_nodes_without_separators() {
        let page = ProductPage::parse(
            "<div>Now <span>$</span><span>1,299</span><span>.</span><span>99</span></div>",
            None,
        )
        .unwrap();
        assert_eq!(page.visible_text(), "Now $1,299.99");
    }
}
