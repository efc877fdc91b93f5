use crate::config::IdentityKey;
use crate::record::{normalize_text, Record};
use serde::Serialize;

/// Property facts scraped from one item detail page
///
/// Zero values mean "unknown": the page either omitted the figure or
/// rendered a placeholder such as `"—"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    name: String,
    bedrooms: u32,
    bathrooms: f64,
    square_feet: u32,
    price_differential: i64,
}

impl DetailRecord {
    pub fn new(
        name: &str,
        bedrooms: u32,
        bathrooms: f64,
        square_feet: u32,
        price_differential: i64,
    ) -> Self {
        Self {
            name: normalize_text("name", name),
            bedrooms,
            bathrooms: bathrooms.max(0.0),
            square_feet,
            price_differential,
        }
    }

    /// Join key back to the listing record
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bedrooms(&self) -> u32 {
        self.bedrooms
    }

    pub fn bathrooms(&self) -> f64 {
        self.bathrooms
    }

    pub fn square_feet(&self) -> u32 {
        self.square_feet
    }

    /// Negative below the site's estimate, positive above it
    pub fn price_differential(&self) -> i64 {
        self.price_differential
    }
}

impl Record for DetailRecord {
    const KIND: &'static str = "detail";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "bedrooms",
        "bathrooms",
        "square_feet",
        "price_differential",
    ];

    // Detail destinations are per item; the name is the only identity.
    fn identity_key(&self, _key: IdentityKey) -> &str {
        &self.name
    }
}
