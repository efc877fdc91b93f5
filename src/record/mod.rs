//! Record model for harvested data
//!
//! Records are normalized once, at construction, and are immutable
//! afterwards. Every string field passes through [`normalize_text`], so a
//! record that reaches the pipeline never carries an empty string.

mod detail;
mod search;

pub use detail::DetailRecord;
pub use search::SearchRecord;

use crate::config::IdentityKey;
use serde::Serialize;

/// A value object that can be staged by the dedup buffer and written to a sink
pub trait Record: Serialize + Send + 'static {
    /// Short label used in logs ("listing", "detail")
    const KIND: &'static str;

    /// Column names, in the order fields are serialized
    const COLUMNS: &'static [&'static str];

    /// Identity used to detect duplicates within one buffer
    fn identity_key(&self, key: IdentityKey) -> &str;
}

/// Normalizes a string field
///
/// Blank input becomes the `"No {field}"` placeholder; anything else is
/// trimmed of surrounding whitespace.
///
/// ```
/// use listing_harvest::record::normalize_text;
///
/// assert_eq!(normalize_text("name", "  12 Ocean Blvd "), "12 Ocean Blvd");
/// assert_eq!(normalize_text("price_currency", ""), "No price_currency");
/// ```
pub fn normalize_text(field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        format!("No {}", field)
    } else {
        trimmed.to_string()
    }
}
