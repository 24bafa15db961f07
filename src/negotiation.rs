//! Media-type matching and response format resolution.
//!
//! [`FormatTable`] is the explicit MIME-family table. It is loaded once
//! (see [`EngineConfig`](crate::EngineConfig)) and shared by every route.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serialization family of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON text.
    Json,
    /// XML document.
    Xml,
}

impl Format {
    /// Returns the family name.
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the format table: a family and the MIME types grouped under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatFamily {
    /// The family.
    pub format: Format,
    /// MIME types that select this family, first one is canonical.
    pub mime_types: Vec<String>,
}

/// Ordered MIME-family table used to pick a response format.
///
/// # Examples
///
/// ```
/// use contract_core::{Format, FormatTable};
///
/// let table = FormatTable::default();
/// assert_eq!(table.resolve("application/xml").0, Format::Xml);
/// // Unknown types fall back to JSON.
/// assert_eq!(table.resolve("text/csv"), (Format::Json, "application/json".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatTable {
    families: Vec<FormatFamily>,
}

impl FormatTable {
    /// Builds a table from explicit rows.
    pub fn new(families: Vec<FormatFamily>) -> Self {
        Self { families }
    }

    /// Returns the rows in lookup order.
    pub fn families(&self) -> &[FormatFamily] {
        &self.families
    }

    /// Resolves a media type (or Accept list) to a format and the MIME type to announce.
    ///
    /// The first family whose list contains one of the media types wins. With
    /// no match the JSON family is used; genuine Accept enforcement happens in
    /// the gate before this is consulted.
    pub fn resolve(&self, media_type: &str) -> (Format, String) {
        for candidate in media_type.split(',').map(essence) {
            for family in &self.families {
                if family
                    .mime_types
                    .iter()
                    .any(|mime| mime.eq_ignore_ascii_case(candidate))
                {
                    return (family.format, candidate.to_ascii_lowercase());
                }
            }
        }
        (Format::Json, self.canonical(Format::Json))
    }

    /// Returns the canonical MIME type of `format`.
    pub fn canonical(&self, format: Format) -> String {
        self.families
            .iter()
            .find(|family| family.format == format)
            .and_then(|family| family.mime_types.first())
            .cloned()
            .unwrap_or_else(|| match format {
                Format::Json => "application/json".to_string(),
                Format::Xml => "application/xml".to_string(),
            })
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new(vec![
            FormatFamily {
                format: Format::Json,
                mime_types: vec!["application/json".to_string(), "application/x-json".to_string()],
            },
            FormatFamily {
                format: Format::Xml,
                mime_types: vec![
                    "text/xml".to_string(),
                    "application/xml".to_string(),
                    "application/x-xml".to_string(),
                ],
            },
        ])
    }
}

/// Returns the media type without parameters, trimmed.
///
/// ```
/// assert_eq!(contract_core::negotiation::essence(" application/json; charset=utf-8"), "application/json");
/// ```
pub fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or_default().trim()
}

/// Returns true if `media_type` equals one of `allowed`, ignoring case and parameters.
pub fn matches_any(media_type: &str, allowed: &[String]) -> bool {
    let media_type = essence(media_type);
    !media_type.is_empty()
        && allowed
            .iter()
            .any(|candidate| essence(candidate).eq_ignore_ascii_case(media_type))
}

/// Picks the offered content type that satisfies an Accept header.
///
/// Entries are tried in header order; `*/*` and `type/*` match the first
/// offered type of that range. An empty header matches nothing.
///
/// # Examples
///
/// ```
/// use contract_core::negotiation::negotiate_accept;
///
/// let offered = vec!["application/json".to_string(), "application/xml".to_string()];
/// assert_eq!(negotiate_accept("text/html, application/xml", &offered), Some("application/xml"));
/// assert_eq!(negotiate_accept("*/*", &offered), Some("application/json"));
/// assert_eq!(negotiate_accept("text/csv", &offered), None);
/// assert_eq!(negotiate_accept("", &offered), None);
/// ```
pub fn negotiate_accept<'a>(accept: &str, offered: &'a [String]) -> Option<&'a str> {
    for entry in accept.split(',').map(essence) {
        if entry.is_empty() {
            continue;
        }
        if entry == "*/*" {
            if let Some(first) = offered.first() {
                return Some(first);
            }
            continue;
        }
        if let Some(range) = entry.strip_suffix("/*") {
            let found = offered.iter().find(|candidate| {
                essence(candidate)
                    .split('/')
                    .next()
                    .is_some_and(|top| top.eq_ignore_ascii_case(range))
            });
            if let Some(found) = found {
                return Some(found);
            }
            continue;
        }
        if let Some(found) = offered
            .iter()
            .find(|candidate| essence(candidate).eq_ignore_ascii_case(entry))
        {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn default_table_maps_known_types() {
        let table = FormatTable::default();
        assert_eq!(table.resolve("application/x-json"), (Format::Json, "application/x-json".to_string()));
        assert_eq!(table.resolve("TEXT/XML"), (Format::Xml, "text/xml".to_string()));
        assert_eq!(table.resolve("application/xml; charset=utf-8").0, Format::Xml);
    }

    #[test]
    fn unknown_type_falls_back_to_json() {
        let table = FormatTable::default();
        assert_eq!(table.resolve(""), (Format::Json, "application/json".to_string()));
        assert_eq!(table.resolve("image/png").0, Format::Json);
    }

    #[test]
    fn first_family_wins() {
        let table = FormatTable::new(vec![
            FormatFamily {
                format: Format::Xml,
                mime_types: vec!["application/data".to_string()],
            },
            FormatFamily {
                format: Format::Json,
                mime_types: vec!["application/data".to_string()],
            },
        ]);
        assert_eq!(table.resolve("application/data").0, Format::Xml);
    }

    #[test]
    fn canonical_falls_back_when_family_missing() {
        let table = FormatTable::new(Vec::new());
        assert_eq!(table.canonical(Format::Xml), "application/xml");
    }

    #[test]
    fn matches_any_ignores_case_and_parameters() {
        let allowed = offered(&["application/json"]);
        assert!(matches_any("Application/JSON; charset=utf-8", &allowed));
        assert!(!matches_any("application/xml", &allowed));
        assert!(!matches_any("", &allowed));
    }

    #[test]
    fn accept_is_matched_case_insensitively() {
        let types = offered(&["application/json"]);
        assert_eq!(negotiate_accept("APPLICATION/JSON", &types), Some("application/json"));
    }

    #[test]
    fn accept_range_matches_top_level_type() {
        let types = offered(&["application/json", "text/xml"]);
        assert_eq!(negotiate_accept("text/*", &types), Some("text/xml"));
        assert_eq!(negotiate_accept("image/*", &types), None);
    }

    #[test]
    fn empty_accept_matches_nothing() {
        let types = offered(&["application/xml"]);
        assert_eq!(negotiate_accept("", &types), None);
        assert_eq!(negotiate_accept("  ", &types), None);
        assert_eq!(negotiate_accept(" , ;q=1", &types), None);
    }

    #[test]
    fn format_table_reads_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            formats: FormatTable,
        }
        let wrapper: Wrapper = toml::from_str(
            r#"
            [[formats]]
            format = "xml"
            mime_types = ["application/vnd.items+xml"]
            "#,
        )
        .unwrap();
        assert_eq!(wrapper.formats.resolve("application/vnd.items+xml").0, Format::Xml);
    }
}
