//! Record extraction from fetched pages
//!
//! Listing pages carry their results as JSON-LD blocks; detail pages are
//! scraped from the stats markup. Both extractors are pure functions of
//! the page body.

use crate::record::{DetailRecord, SearchRecord};
use crate::url::canonicalize_url;
use crate::UrlError;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Number, Value};
use thiserror::Error;
use url::Url;

const LD_JSON_SELECTOR: &str = "script[type='application/ld+json']";
const PRODUCT_TYPE: &str = "Product";

const BEDS_SELECTOR: &str = "div[data-rf-test-id='abp-beds'] .statsValue";
const BATHS_SELECTOR: &str = "div[data-rf-test-id='abp-baths'] .statsValue";
const SQFT_SELECTOR: &str = "div[data-rf-test-id='abp-sqFt'] .statsValue";
const PRICE_DIFF_SELECTOR: &str = "span[data-rf-test-name='avmDiffValue']";

/// Page content could not be turned into records
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Malformed JSON-LD block: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Listing product is missing '{0}'")]
    MissingField(&'static str),

    #[error("Listing product has a non-numeric price: {0}")]
    InvalidPrice(String),

    #[error("Listing product has an unusable URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Detail page has no listing name to join on")]
    MissingIdentity,

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Extracts search records from a listing page
///
/// Each JSON-LD block that decodes to an array contributes its first
/// `Product` element. Blocks that are not arrays, and arrays without a
/// product, are skipped. Item URLs are resolved against `page_url`.
///
/// # Example
///
/// ```
/// use listing_harvest::crawler::extract_listings;
/// use url::Url;
///
/// let html = r#"<script type="application/ld+json">
///   [{"@type": "Product", "name": "1 Sea Ln", "url": "/home/1",
///     "offers": {"price": 250000, "priceCurrency": "USD"}}]
/// </script>"#;
/// let page = Url::parse("https://www.redfin.com/city/1/SC/X/page-1").unwrap();
/// let records = extract_listings(html, &page).unwrap();
/// assert_eq!(records[0].url(), "https://www.redfin.com/home/1");
/// ```
pub fn extract_listings(html: &str, page_url: &Url) -> Result<Vec<SearchRecord>, ExtractionError> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    let selector = selector(LD_JSON_SELECTOR)?;

    for script in document.select(&selector) {
        let text: String = script.text().collect();
        let value: Value = serde_json::from_str(text.trim())?;

        let Value::Array(elements) = value else {
            continue;
        };

        match elements.iter().find(|element| is_product(element)) {
            Some(product) => records.push(search_record(product, page_url)?),
            None => tracing::debug!("Skipping JSON-LD array without a product on {}", page_url),
        }
    }

    Ok(records)
}

/// Extracts a detail record for the listing called `name`
///
/// Missing or unreadable stats degrade to 0; only a blank join name fails
/// the page.
pub fn extract_detail(html: &str, name: &str) -> Result<DetailRecord, ExtractionError> {
    if name.trim().is_empty() {
        return Err(ExtractionError::MissingIdentity);
    }

    let document = Html::parse_document(html);

    let bedrooms = stat(&document, BEDS_SELECTOR, "bedrooms", parse_count);
    let bathrooms = stat(&document, BATHS_SELECTOR, "bathrooms", parse_decimal);
    let square_feet = stat(&document, SQFT_SELECTOR, "square_feet", parse_count);
    let price_differential = price_differential(&document);

    Ok(DetailRecord::new(
        name,
        bedrooms,
        bathrooms,
        square_feet,
        price_differential,
    ))
}

/// Checks the JSON-LD type discriminator
fn is_product(element: &Value) -> bool {
    match element.get("@type") {
        Some(Value::String(kind)) => kind == PRODUCT_TYPE,
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some(PRODUCT_TYPE)),
        _ => false,
    }
}

fn search_record(product: &Value, page_url: &Url) -> Result<SearchRecord, ExtractionError> {
    let name = product
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ExtractionError::MissingField("name"))?;

    let offers = match product.get("offers") {
        Some(Value::Array(list)) => list.first(),
        other => other,
    }
    .ok_or(ExtractionError::MissingField("offers"))?;

    let price = match offers.get("price") {
        Some(Value::Number(number)) => number.clone(),
        Some(Value::String(text)) => parse_price(text)?,
        _ => return Err(ExtractionError::MissingField("offers.price")),
    };

    let currency = offers
        .get("priceCurrency")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let raw_url = product
        .get("url")
        .and_then(Value::as_str)
        .ok_or(ExtractionError::MissingField("url"))?;
    let url = canonicalize_url(raw_url, page_url)?;

    Ok(SearchRecord::new(name, price, currency, url.as_str()))
}

/// Parses a price published as text, e.g. `"$425,000"`
fn parse_price(text: &str) -> Result<Number, ExtractionError> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    cleaned
        .parse::<Number>()
        .map_err(|_| ExtractionError::InvalidPrice(text.to_string()))
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    match selector(css) {
        Ok(selector) => document.select(&selector).next(),
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    }
}

/// Reads one optional stat, falling back to zero
fn stat<T: Default>(
    document: &Html,
    css: &str,
    field: &str,
    parse: fn(&str) -> Option<T>,
) -> T {
    let Some(element) = select_first(document, css) else {
        tracing::debug!("No {} on detail page", field);
        return T::default();
    };

    let text: String = element.text().collect();
    parse(&text).unwrap_or_else(|| {
        tracing::debug!("Unreadable {} value {:?}, using 0", field, text.trim());
        T::default()
    })
}

/// Keeps the characters of a rendered number; a dash placeholder reads as zero
fn numeric_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if matches!(trimmed, "—" | "–" | "-" | "--") {
        return Some("0".to_string());
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    (!cleaned.is_empty()).then_some(cleaned)
}

fn parse_count(text: &str) -> Option<u32> {
    let cleaned = numeric_text(text)?;
    cleaned
        .parse::<u32>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|v| v as u32))
}

fn parse_decimal(text: &str) -> Option<f64> {
    numeric_text(text)?.parse::<f64>().ok()
}

/// Signed difference from the site's estimate
///
/// The magnitude comes from the text; a `red` class marks a value below
/// the estimate.
fn price_differential(document: &Html) -> i64 {
    let Some(element) = select_first(document, PRICE_DIFF_SELECTOR) else {
        tracing::debug!("No price_differential on detail page");
        return 0;
    };

    let text: String = element.text().collect();
    let Some(magnitude) = numeric_text(&text).and_then(|n| n.parse::<f64>().ok()) else {
        tracing::debug!("Unreadable price_differential {:?}, using 0", text.trim());
        return 0;
    };

    let magnitude = magnitude.round() as i64;
    if element.value().classes().any(|class| class == "red") {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://www.redfin.com/city/12572/SC/Myrtle-Beach/page-1").unwrap()
    }

    fn ld_json(body: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{}</script></head><body></body></html>"#,
            body
        )
    }

    #[test]
    fn test_extracts_product_from_array() {
        let html = ld_json(
            r#"[
                {"@type": "SingleFamilyResidence", "name": "ignored"},
                {"@type": "Product", "name": " 123 Ocean Blvd ",
                 "url": "https://www.redfin.com/SC/Myrtle-Beach/123-Ocean-Blvd/home/1",
                 "offers": {"@type": "Offer", "price": 425000, "priceCurrency": "USD"}}
            ]"#,
        );

        let records = extract_listings(&html, &page_url()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "123 Ocean Blvd");
        assert_eq!(records[0].price(), &Number::from(425_000));
        assert_eq!(records[0].price_currency(), "USD");
        assert_eq!(
            records[0].url(),
            "https://www.redfin.com/SC/Myrtle-Beach/123-Ocean-Blvd/home/1"
        );
    }

    #[test]
    fn test_non_array_blocks_skipped() {
        let html = format!(
            "{}{}",
            ld_json(r#"{"@type": "Organization", "name": "Redfin"}"#),
            ld_json(
                r#"[{"@type": "Product", "name": "A", "url": "/a",
                     "offers": {"price": 1, "priceCurrency": "USD"}}]"#
            )
        );

        let records = extract_listings(&html, &page_url()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url(), "https://www.redfin.com/a");
    }

    #[test]
    fn test_array_without_product_skipped() {
        let html = ld_json(r#"[{"@type": "BreadcrumbList"}, {"@type": "Place"}]"#);
        assert!(extract_listings(&html, &page_url()).unwrap().is_empty());
    }

    #[test]
    fn test_type_list_discriminator() {
        let html = ld_json(
            r#"[{"@type": ["Product", "RealEstateListing"], "name": "B", "url": "/b",
                 "offers": [{"price": "$310,500", "priceCurrency": "USD"}]}]"#,
        );

        let records = extract_listings(&html, &page_url()).unwrap();
        assert_eq!(records[0].price(), &Number::from(310_500));
    }

    #[test]
    fn test_missing_currency_uses_placeholder() {
        let html = ld_json(r#"[{"@type": "Product", "name": "C", "url": "/c", "offers": {"price": 5}}]"#);

        let records = extract_listings(&html, &page_url()).unwrap();
        assert_eq!(records[0].price_currency(), "No price_currency");
    }

    #[test]
    fn test_malformed_json_fails_page() {
        let html = ld_json("[{not json");
        assert!(matches!(
            extract_listings(&html, &page_url()),
            Err(ExtractionError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_product_without_offers_fails_page() {
        let html = ld_json(r#"[{"@type": "Product", "name": "D", "url": "/d"}]"#);
        assert!(matches!(
            extract_listings(&html, &page_url()),
            Err(ExtractionError::MissingField("offers"))
        ));
    }

    #[test]
    fn test_page_without_structured_data_is_empty() {
        let html = "<html><body><p>No results</p></body></html>";
        assert!(extract_listings(html, &page_url()).unwrap().is_empty());
    }

    fn detail_html(beds: &str, baths: &str, sqft: &str, diff: &str) -> String {
        format!(
            r#"<html><body>
            <div data-rf-test-id="abp-beds"><div class="statsValue">{}</div></div>
            <div data-rf-test-id="abp-baths"><div class="statsValue">{}</div></div>
            <div data-rf-test-id="abp-sqFt"><span class="statsValue">{}</span></div>
            {}
            </body></html>"#,
            beds, baths, sqft, diff
        )
    }

    #[test]
    fn test_extract_detail_full() {
        let html = detail_html(
            "3",
            "2.5",
            "1,850",
            r#"<span data-rf-test-name="avmDiffValue" class="diffValue green">12,300</span>"#,
        );

        let record = extract_detail(&html, "123 Ocean Blvd").unwrap();
        assert_eq!(record.name(), "123 Ocean Blvd");
        assert_eq!(record.bedrooms(), 3);
        assert_eq!(record.bathrooms(), 2.5);
        assert_eq!(record.square_feet(), 1850);
        assert_eq!(record.price_differential(), 12_300);
    }

    #[test]
    fn test_red_differential_is_negative() {
        let html = detail_html(
            "2",
            "1",
            "900",
            r#"<span data-rf-test-name="avmDiffValue" class="diffValue red">$4,000</span>"#,
        );

        let record = extract_detail(&html, "x").unwrap();
        assert_eq!(record.price_differential(), -4_000);
    }

    #[test]
    fn test_dash_bedrooms_read_as_zero() {
        let html = detail_html("—", "—", "1,000", "");

        let record = extract_detail(&html, "Lot 7").unwrap();
        assert_eq!(record.bedrooms(), 0);
        assert_eq!(record.bathrooms(), 0.0);
        assert_eq!(record.square_feet(), 1000);
        assert_eq!(record.price_differential(), 0);
    }

    #[test]
    fn test_missing_stats_degrade_to_zero() {
        let record = extract_detail("<html><body></body></html>", "Lot 8").unwrap();
        assert_eq!(record.bedrooms(), 0);
        assert_eq!(record.bathrooms(), 0.0);
        assert_eq!(record.square_feet(), 0);
        assert_eq!(record.price_differential(), 0);
    }

    #[test]
    fn test_unreadable_stat_degrades_to_zero() {
        let html = detail_html("Studio", "1", "n/a", "");
        let record = extract_detail(&html, "Lot 9").unwrap();
        assert_eq!(record.bedrooms(), 0);
        assert_eq!(record.square_feet(), 0);
        assert_eq!(record.bathrooms(), 1.0);
    }

    #[test]
    fn test_blank_name_fails_page() {
        assert!(matches!(
            extract_detail("<html></html>", "  "),
            Err(ExtractionError::MissingIdentity)
        ));
    }

    #[test]
    fn test_page_selectors_are_valid() {
        for css in [
            LD_JSON_SELECTOR,
            BEDS_SELECTOR,
            BATHS_SELECTOR,
            SQFT_SELECTOR,
            PRICE_DIFF_SELECTOR,
        ] {
            assert!(selector(css).is_ok(), "{css} should parse");
        }
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let err = selector("div[data-rf-test-id=").unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::InvalidSelector { ref selector, .. } if selector == "div[data-rf-test-id="
        ));

        let document = Html::parse_document("<div></div>");
        assert!(select_first(&document, "div[").is_none());
    }
}
