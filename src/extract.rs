//! Field extraction heuristics.
//!
//! Every field is read by a cascade: an ordered list of probes tried in turn
//! until one produces a value. Probe order is precedence, so retailer
//! conventions go first and generic markup last.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use crate::document::ProductPage;
use crate::product::{Price, ProductRecord};

/// Currency symbol, optional space, then an amount with `,`/`.` separators.
static PRICE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([₹$€£¥])\s?(\d+(?:[.,]\d+)*)").unwrap());

static NAME_CASCADE: Lazy<Cascade<String>> = Lazy::new(|| {
    Cascade::new(vec![
        Box::new(TextProbe::new("h1")),
        Box::new(TextProbe::new("#productTitle")),
        Box::new(TextProbe::new(r#"[itemprop="name"]"#)),
        Box::new(AttrProbe::new(r#"meta[property="og:title"]"#, "content")),
    ])
});

static PRICE_CASCADE: Lazy<Cascade<Price>> = Lazy::new(|| {
    Cascade::new(vec![
        Box::new(PriceProbe::new("#priceblock_ourprice")),
        Box::new(PriceProbe::new(".price")),
        Box::new(PriceProbe::new(r#".item_price[data-hook="product_price"]"#)),
        Box::new(PriceProbe::new(r#"meta[itemprop="price"]"#)),
        Box::new(PriceProbe::new(".a-offscreen")),
        Box::new(PageTextPriceProbe),
    ])
});

static DESCRIPTION_CASCADE: Lazy<Cascade<String>> =
    Lazy::new(|| Cascade::new(vec![Box::new(TextProbe::new(".product-description"))]));

static IMAGE_CASCADE: Lazy<Cascade<String>> = Lazy::new(|| {
    Cascade::new(vec![Box::new(ImageProbe::new(&[
        "#landingImage",
        ".a-dynamic-image",
        ".product-image",
        ".primary-image",
    ]))])
});

/// One way of finding a field value on a page.
pub trait Probe<T>: Send + Sync {
    fn probe(&self, page: &ProductPage) -> Option<T>;
}

/// Ordered probes; the first hit wins.
pub struct Cascade<T> {
    probes: Vec<Box<dyn Probe<T>>>,
}

impl<T> Cascade<T> {
    pub fn new(probes: Vec<Box<dyn Probe<T>>>) -> Self {
        Self { probes }
    }

    pub fn run(&self, page: &ProductPage) -> Option<T> {
        self.probes.iter().find_map(|probe| probe.probe(page))
    }
}

fn compile(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector {selector:?}: {e}"))
}

/// Trimmed text of the first matching element that has any.
pub struct TextProbe {
    selector: Selector,
}

impl TextProbe {
    pub fn new(selector: &str) -> Self {
        Self { selector: compile(selector) }
    }
}

impl Probe<String> for TextProbe {
    fn probe(&self, page: &ProductPage) -> Option<String> {
        page
            .select_all(&self.selector)
            .map(ProductPage::text_of)
            .find(|text| !text.is_empty())
    }
}

/// Trimmed attribute of the first matching element where it is non-empty.
pub struct AttrProbe {
    selector: Selector,
    attr: &'static str,
}

impl AttrProbe {
    pub fn new(selector: &str, attr: &'static str) -> Self {
        Self { selector: compile(selector), attr }
    }
}

impl Probe<String> for AttrProbe {
    fn probe(&self, page: &ProductPage) -> Option<String> {
        page
            .select_all(&self.selector)
            .filter_map(|element| ProductPage::attr_of(element, self.attr))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

/// Runs the price pattern over the text of the first matching element.
/// No symbol in that text means no match, and the cascade moves on.
pub struct PriceProbe {
    selector: Selector,
}

impl PriceProbe {
    pub fn new(selector: &str) -> Self {
        Self { selector: compile(selector) }
    }
}

impl Probe<Price> for PriceProbe {
    fn probe(&self, page: &ProductPage) -> Option<Price> {
        let element = page.select_first(&self.selector)?;
        parse_price(&ProductPage::text_of(element))
    }
}

/// Last resort: first price anywhere in the visible page text.
pub struct PageTextPriceProbe;

impl Probe<Price> for PageTextPriceProbe {
    fn probe(&self, page: &ProductPage) -> Option<Price> {
        parse_price(&page.visible_text())
    }
}

/// Image source of the first element matched by any of the selectors, in
/// order. Once an element is found its attributes decide the outcome; later
/// selectors are not consulted.
pub struct ImageProbe {
    selectors: Vec<Selector>,
}

const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-old-hires"];

impl ImageProbe {
    pub fn new(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| compile(s)).collect(),
        }
    }
}

impl Probe<String> for ImageProbe {
    fn probe(&self, page: &ProductPage) -> Option<String> {
        let element = self
            .selectors
            .iter()
            .find_map(|selector| page.select_first(selector))?;

        let src = IMAGE_SOURCE_ATTRS
            .iter()
            .filter_map(|attr| ProductPage::attr_of(element, attr))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())?;

        Some(resolve_url(page, &src))
    }
}

fn resolve_url(page: &ProductPage, src: &str) -> String {
    match page.base_url() {
        Some(base) if !src.starts_with("data:") => base
            .join(src)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| src.to_string()),
        _ => src.to_string(),
    }
}

/// First `(symbol, amount)` in `text`.
pub fn parse_price(text: &str) -> Option<Price> {
    let caps = PRICE_REGEX.captures(text)?;
    let currency = caps.get(1)?.as_str().chars().next()?;
    let amount = normalize_amount(caps.get(2)?.as_str())?;
    Some(Price { amount, currency })
}

/// Turn a separator-laden amount into an `f64`.
///
/// Whichever of `,`/`.` comes last is the decimal mark when both appear.
/// A lone comma followed by one or two digits is a decimal comma; every other
/// comma is a thousands separator (which also covers Indian `1,23,456`).
/// Repeated dots are grouping (`1.234.567`); a single dot is decimal.
fn normalize_amount(raw: &str) -> Option<f64> {
    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');

    let cleaned = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(comma), None) => {
            let decimals = raw.len() - comma - 1;
            if raw.matches(',').count() == 1 && decimals <= 2 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (None, Some(_)) if raw.matches('.').count() > 1 => raw.replace('.', ""),
        _ => raw.to_string(),
    };

    cleaned.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

pub fn extract_name(page: &ProductPage) -> Option<String> {
    NAME_CASCADE.run(page)
}

pub fn extract_price(page: &ProductPage) -> Option<Price> {
    PRICE_CASCADE.run(page)
}

pub fn extract_description(page: &ProductPage) -> Option<String> {
    DESCRIPTION_CASCADE.run(page)
}

pub fn extract_image_url(page: &ProductPage) -> Option<String> {
    IMAGE_CASCADE.run(page)
}

pub fn extract_product(page: &ProductPage) -> ProductRecord {
    ProductRecord {
        name: extract_name(page),
        price: extract_price(page),
        description: extract_description(page),
        image_url: extract_image_url(page),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn page(html: &str) -> ProductPage {
        ProductPage::parse(html, None).unwrap()
    }

    fn price(amount: f64, currency: char) -> Option<Price> {
        Some(Price { amount, currency })
    }

    #[test]
    fn parses_prices_with_separators() {
        assert_eq!(parse_price("$1,234.56"), price(1234.56, '$'));
        assert_eq!(parse_price("₹99"), price(99.0, '₹'));
        assert_eq!(parse_price("₹1,23,456"), price(123456.0, '₹'));
        assert_eq!(parse_price("€1.234,56"), price(1234.56, '€'));
        assert_eq!(parse_price("€12,50"), price(12.5, '€'));
        assert_eq!(parse_price("£ 7.99 incl. VAT"), price(7.99, '£'));
        assert_eq!(parse_price("¥1.234.567"), price(1234567.0, '¥'));
        assert_eq!(parse_price("Only $5. Hurry"), price(5.0, '$'));
    }

    #[test]
    fn text_without_symbol_does_not_match() {
        assert_eq!(parse_price("1,234.56"), None);
        assert_eq!(parse_price("USD 20"), None);
        assert_eq!(parse_price("$"), None);
    }

    #[test]
    fn overflowing_amount_is_not_a_price() {
        let text = format!("${}", "9".repeat(400));
        assert_eq!(parse_price(&text), None);

        let html = format!(r#"<h1>Lamp</h1><span class="price">{text}</span>"#);
        let record = extract_product(&page(&html));
        assert_eq!(record.price, None);
        assert!(!record.is_complete());
    }

    #[test]
    fn name_prefers_h1_and_skips_empty_headings() {
        let p = page(r#"<h1>Espresso Machine</h1><span id="productTitle">Other</span>"#);
        assert_eq!(extract_name(&p).as_deref(), Some("Espresso Machine"));

        let p = page(r#"<h1>   </h1><span id="productTitle"> Milk Frother </span>"#);
        assert_eq!(extract_name(&p).as_deref(), Some("Milk Frother"));

        let p = page(r#"<head><meta property="og:title" content="Tea Kettle"></head>"#);
        assert_eq!(extract_name(&p).as_deref(), Some("Tea Kettle"));

        assert_eq!(extract_name(&page("<p>no heading</p>")), None);
    }

    #[test]
    fn name_uses_first_non_empty_heading() {
        let p = page(r#"<h1></h1><h1>Real Name</h1><span id="productTitle">Other</span>"#);
        assert_eq!(extract_name(&p).as_deref(), Some("Real Name"));

        let p = page(
            r#"<head><meta property="og:title" content=" "><meta property="og:title" content="Mug"></head>"#,
        );
        assert_eq!(extract_name(&p).as_deref(), Some("Mug"));
    }

    #[test]
    fn price_split_across_inline_elements_keeps_decimals() {
        let p = page("<div>Now <span>$</span><span>1,299</span><span>.</span><span>99</span></div>");
        assert_eq!(extract_price(&p), price(1299.99, '$'));
    }

    #[test]
    fn primary_price_selector_wins() {
        let p = page(
            r#"<span class="price">$20.00</span>
               <span id="priceblock_ourprice">$18.50</span>"#,
        );
        assert_eq!(extract_price(&p), price(18.5, '$'));
    }

    #[test]
    fn price_cascade_skips_element_without_symbol() {
        let p = page(
            r#"<span id="priceblock_ourprice">Currently unavailable</span>
               <span class="a-offscreen">₹2,499.00</span>"#,
        );
        assert_eq!(extract_price(&p), price(2499.0, '₹'));
    }

    #[test]
    fn price_falls_back_to_page_text() {
        let p = page(
            r#"<body><script>window.cfg = {"p": "$1"};</script>
               <div>Deal of the day: <b>£49.99</b></div></body>"#,
        );
        assert_eq!(extract_price(&p), price(49.99, '£'));
    }

    #[test]
    fn selector_match_beats_earlier_page_text() {
        let p = page(r#"<p>Was €80</p><div class="price">€65</div>"#);
        assert_eq!(extract_price(&p), price(65.0, '€'));
    }

    #[test]
    fn no_price_anywhere_leaves_both_fields_absent() {
        let record = extract_product(&page("<h1>Widget</h1><p>Call for pricing</p>"));
        assert_eq!(record.name.as_deref(), Some("Widget"));
        assert_eq!(record.price, None);
    }

    #[test]
    fn description_is_trimmed() {
        let p = page(r#"<div class="product-description">
              Hand-built in small batches.
            </div>"#);
        assert_eq!(
            extract_description(&p).as_deref(),
            Some("Hand-built in small batches.")
        );
        assert_eq!(extract_description(&page("<p>x</p>")), None);
    }

    #[test]
    fn image_uses_first_matching_selector() {
        let p = page(
            r#"<img class="product-image" src="https://cdn.test/b.jpg">
               <img id="landingImage" src="https://cdn.test/a.jpg">"#,
        );
        assert_eq!(extract_image_url(&p).as_deref(), Some("https://cdn.test/a.jpg"));
    }

    #[test]
    fn image_reads_lazy_load_attributes() {
        let p = page(r#"<img class="primary-image" data-src="https://cdn.test/lazy.jpg">"#);
        assert_eq!(extract_image_url(&p).as_deref(), Some("https://cdn.test/lazy.jpg"));
    }

    #[test]
    fn image_absent_when_nothing_matches() {
        assert_eq!(extract_image_url(&page(r#"<img src="/logo.png">"#)), None);
        assert_eq!(extract_image_url(&page(r#"<img id="landingImage">"#)), None);
    }

    #[test]
    fn relative_image_is_resolved_against_page_url() {
        let base = Url::parse("https://shop.test/p/123").unwrap();
        let p = ProductPage::parse(r#"<img class="product-image" src="/img/123.jpg">"#, Some(base))
            .unwrap();
        assert_eq!(
            extract_image_url(&p).as_deref(),
            Some("https://shop.test/img/123.jpg")
        );
    }

    #[test]
    fn full_record_from_typical_page() {
        let record = extract_product(&page(
            r#"<html><body>
                 <h1> Pour-Over Set </h1>
                 <div class="price">$34.00</div>
                 <div class="product-description">Glass carafe and dripper.</div>
                 <img class="product-image" src="https://cdn.test/set.jpg">
               </body></html>"#,
        ));
        assert_eq!(
            record,
            ProductRecord {
                name: Some("Pour-Over Set".to_string()),
                price: price(34.0, '$'),
                description: Some("Glass carafe and dripper.".to_string()),
                image_url: Some("https://cdn.test/set.jpg".to_string()),
                error: None,
            }
        );
        assert!(record.is_complete());
    }
}
