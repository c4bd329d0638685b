pub mod infobox;

pub use infobox::InfoRecord;

/// Parse a fetched article and pull the physical-property rows out of its infobox.
pub fn extract_record(subject: &str, url: &str, html: &str) -> InfoRecord {
    let document = scraper::Html::parse_document(html);
    infobox::extract(subject, url, &document)
}
