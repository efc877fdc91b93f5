//! URL handling module for Listing-Harvest
//!
//! This module builds listing page URLs, canonicalizes item URLs used as
//! identity keys, and derives file names for per-item destinations.

mod normalize;

pub use normalize::canonicalize_url;

use crate::config::LocationEntry;
use crate::UrlError;
use sha2::{Digest, Sha256};
use url::Url;

/// Replaces spaces with dashes, the way the site spells localities in paths
///
/// ```
/// use listing_harvest::url::dashed;
///
/// assert_eq!(dashed("Myrtle Beach"), "Myrtle-Beach");
/// ```
pub fn dashed(text: &str) -> String {
    text.trim().replace(' ', "-")
}

/// Builds the URL of one listing page for a location
///
/// `page_index` is zero-based; the site numbers pages from 1.
///
/// ```
/// use listing_harvest::config::LocationEntry;
/// use listing_harvest::url::listing_page_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.redfin.com").unwrap();
/// let location = LocationEntry {
///     id_number: 12572,
///     state: "SC".to_string(),
///     locality: "Myrtle Beach".to_string(),
/// };
/// let url = listing_page_url(&base, &location, 0).unwrap();
/// assert_eq!(url.as_str(), "https://www.redfin.com/city/12572/SC/Myrtle-Beach/page-1");
/// ```
pub fn listing_page_url(
    base: &Url,
    location: &LocationEntry,
    page_index: u32,
) -> Result<Url, UrlError> {
    let path = format!(
        "city/{}/{}/{}/page-{}",
        location.id_number,
        location.state.trim(),
        dashed(&location.locality),
        page_index + 1
    );

    // Url::join would drop the last base segment without a trailing slash
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(&path).map_err(|e| UrlError::Parse(e.to_string()))
}

/// Derives a CSV file name from a display value
///
/// Spaces become dashes and path separators are replaced so an item name
/// can never escape the output directory.
pub fn file_name_for(text: &str) -> String {
    format!("{}.csv", file_stem(text))
}

/// Derives the CSV file name of one item's details
///
/// Display names are not unique, so the stem carries a short digest of
/// the item URL. Same name, different URL: different file.
///
/// ```
/// use listing_harvest::url::detail_file_name;
///
/// let a = detail_file_name("1 Main St", "https://www.redfin.com/home/1");
/// let b = detail_file_name("1 Main St", "https://www.redfin.com/home/2");
/// assert!(a.starts_with("1-Main-St-"));
/// assert_ne!(a, b);
/// ```
pub fn detail_file_name(name: &str, url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("{}-{}.csv", file_stem(name), &digest[..DIGEST_LEN])
}

const DIGEST_LEN: usize = 10;

fn file_stem(text: &str) -> String {
    let stem: String = dashed(text)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();

    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}
