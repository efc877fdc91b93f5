use crate::config::IdentityKey;
use crate::record::{normalize_text, Record};
use serde::Serialize;
use serde_json::Number;

/// One result row from a listing page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    name: String,
    price: Number,
    price_currency: String,
    url: String,
}

impl SearchRecord {
    /// Builds a normalized search record
    ///
    /// The price is kept exactly as the source published it.
    pub fn new(name: &str, price: Number, price_currency: &str, url: &str) -> Self {
        Self {
            name: normalize_text("name", name),
            price,
            price_currency: normalize_text("price_currency", price_currency),
            url: normalize_text("url", url),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> &Number {
        &self.price
    }

    pub fn price_currency(&self) -> &str {
        &self.price_currency
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Record for SearchRecord {
    const KIND: &'static str = "listing";
    const COLUMNS: &'static [&'static str] = &["name", "price", "price_currency", "url"];

    fn identity_key(&self, key: IdentityKey) -> &str {
        match key {
            IdentityKey::Url => &self.url,
            IdentityKey::Name => &self.name,
        }
    }
}
