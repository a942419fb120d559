use serde::Serialize;

/// A price and the currency symbol it was written with. Both halves always
/// come from the same regex match.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Price {
    #[serde(rename = "price")]
    pub amount: f64,
    pub currency: char,
}

/// Structured product data returned for one scrape request.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ProductRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProductRecord {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Name and price are the two fields a price tracker cannot do without.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.price.is_some()
    }
}
