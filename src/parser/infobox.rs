use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Header labels containing any of these are kept.
pub const FIELD_KEYWORDS: &[&str] = &["Dimensions", "Mass", "Mean density"];

static INFOBOX_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.infobox").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static DATA_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// One subject's scraped properties. `name` and `url` are always present;
/// `fields` holds the matching infobox rows in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoRecord {
    pub name: String,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl InfoRecord {
    pub fn new(name: &str, url: &str) -> Self {
        InfoRecord {
            name: name.to_string(),
            url: url.to_string(),
            fields: Vec::new(),
        }
    }

    /// A repeated key keeps its original position and takes the new value.
    pub fn insert(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for InfoRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.fields.len()))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("url", &self.url)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn is_wanted_label(label: &str) -> bool {
    FIELD_KEYWORDS.iter().any(|k| label.contains(k))
}

pub fn extract(subject: &str, url: &str, document: &Html) -> InfoRecord {
    let mut record = InfoRecord::new(subject, url);

    let Some(table) = document.select(&INFOBOX_SEL).next() else {
        return record;
    };

    for row in table.select(&ROW_SEL) {
        let header = row.select(&HEADER_SEL).next();
        let data = row.select(&DATA_SEL).next();
        if let (Some(header), Some(data)) = (header, data) {
            let key = text_of(header);
            if is_wanted_label(&key) {
                record.insert(key, text_of(data));
            }
        }
    }

    record
}

/// Visible text of a cell: `<style>`/`<script>` bodies (inline
/// TemplateStyles, mostly) are left out.
fn text_of(el: ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "style" | "script"))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out.trim().to_string()
}

// ── Tests ──
