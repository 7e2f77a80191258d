//! Extraction of a parent record's [MatchCriteria] from its MODS metadata.
//!
//! Only three values are needed, so the document is scanned with patterns rather than parsed
//! into a tree:
//!
//! - `mods/identifier[@type=<identifier type>]`
//! - `mods/originInfo/dateIssued[@point='start']`
//! - `mods/originInfo/dateIssued[@point='end']`
//!
//! Namespace prefixes (`<mods:identifier>`) are accepted. Comments are ignored and CDATA
//! sections are read as text. A missing date means the range is unbounded on that side; a
//! missing identifier is an error.

use regex::Regex;

use crate::{config::MetadataConfig, error::RelsyncError, properties::MatchCriteria};

pub struct ModsExtractor {
    comment: Regex,
    cdata: Regex,
    entity: Regex,
    identifier: Regex,
    origin_info: Regex,
    start_date: Regex,
    end_date: Regex,
}

impl ModsExtractor {
    pub fn new(config: &MetadataConfig) -> Result<Self, RelsyncError> {
        Ok(ModsExtractor {
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            cdata: Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>")?,
            entity: Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|(lt|gt|quot|apos|amp));")?,
            identifier: attribute_element("identifier", "type", &config.identifier_type)?,
            origin_info: Regex::new(
                r"(?s)<(?:[\w.-]+:)?originInfo\b[^>]*>(.*?)</(?:[\w.-]+:)?originInfo\s*>",
            )?,
            start_date: attribute_element("dateIssued", "point", "start")?,
            end_date: attribute_element("dateIssued", "point", "end")?,
        })
    }

    pub fn extract(&self, mods: &str) -> Result<MatchCriteria, RelsyncError> {
        let mods = self.comment.replace_all(mods, "");
        // CDATA content is literal text; escape it so entity decoding leaves it untouched
        let mods = self
            .cdata
            .replace_all(&mods, |caps: &regex::Captures| escape(&caps[1]));
        let mods: &str = &mods;
        let identifier = self.capture(&self.identifier, mods).ok_or_else(|| {
            RelsyncError::Metadata("MODS document has no matching identifier".to_string())
        })?;
        if identifier.is_empty() {
            return Err(RelsyncError::Metadata(
                "MODS identifier is empty".to_string(),
            ));
        }
        let origin_info = self
            .origin_info
            .captures(mods)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let start_date = self
            .capture(&self.start_date, origin_info)
            .unwrap_or_default();
        let end_date = self
            .capture(&self.end_date, origin_info)
            .unwrap_or_default();
        Ok(MatchCriteria {
            identifier,
            start_date,
            end_date,
        })
    }

    fn capture(&self, pattern: &Regex, haystack: &str) -> Option<String> {
        pattern
            .captures(haystack)
            .and_then(|caps| caps.get(1))
            .map(|m| self.unescape(m.as_str().trim()))
    }

    /// Decode the predefined entities and numeric character references in one pass. Unknown
    /// or invalid references are kept as written.
    fn unescape(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &regex::Captures| {
                let decoded = if let Some(dec) = caps.get(1) {
                    dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else if let Some(hex) = caps.get(2) {
                    u32::from_str_radix(hex.as_str(), 16)
                        .ok()
                        .and_then(char::from_u32)
                } else {
                    match caps.get(3).map(|m| m.as_str()) {
                        Some("lt") => Some('<'),
                        Some("gt") => Some('>'),
                        Some("quot") => Some('"'),
                        Some("apos") => Some('\''),
                        Some("amp") => Some('&'),
                        _ => None,
                    }
                };
                match decoded {
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn attribute_element(element: &str, attribute: &str, value: &str) -> Result<Regex, RelsyncError> {
    Ok(Regex::new(&format!(
        r#"(?s)<(?:[\w.-]+:)?{element}\b[^>]*\b{attribute}\s*=\s*["']{value}["'][^>]*>([^<]*)</(?:[\w.-]+:)?{element}\s*>"#,
        element = regex::escape(element),
        attribute = regex::escape(attribute),
        value = regex::escape(value),
    ))?)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
