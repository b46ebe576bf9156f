//! VCF-style header text: `##KEY=VALUE` meta-information lines, the
//! `#CHROM...` column line naming samples, and the small `<ID=...,...>`
//! bracket grammar used inside `##INFO`/`##FORMAT`/`##FILTER`/`##contig`
//! lines.

use crate::error::SavError;

pub const MAGIC: [u8; 5] = *b"SAV\x02\0";

/// One `##KEY=VALUE` meta-information line, value text verbatim (including
/// any `<...>` bracket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub lines: Vec<HeaderLine>,
    pub samples: Vec<String>,
}

impl Header {
    pub fn new(lines: Vec<HeaderLine>, samples: Vec<String>) -> Self {
        Self { lines, samples }
    }

    /// Renders the header text body (meta lines, column line, trailing
    /// newline) that gets NUL-terminated and padded by the writer.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str("##");
            text.push_str(&line.key);
            text.push('=');
            text.push_str(&line.value);
            text.push('\n');
        }
        text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
        for sample in &self.samples {
            text.push('\t');
            text.push_str(sample);
        }
        text.push('\n');
        text
    }

    pub fn parse(text: &str) -> Result<Self, SavError> {
        let mut lines = Vec::new();
        let mut samples = Vec::new();
        for raw in text.lines() {
            if let Some(rest) = raw.strip_prefix("##") {
                let (key, value) = rest
                    .split_once('=')
                    .ok_or_else(|| SavError::CorruptHeader(format!("meta line missing '=': {raw:?}")))?;
                lines.push(HeaderLine { key: key.to_string(), value: value.to_string() });
            } else if let Some(rest) = raw.strip_prefix("#CHROM") {
                let cols: Vec<&str> = rest.split('\t').filter(|c| !c.is_empty()).collect();
                // Fixed columns are POS ID REF ALT QUAL FILTER INFO [FORMAT [samples...]].
                samples = cols.iter().skip(8).map(|s| s.to_string()).collect();
            }
        }
        Ok(Self { lines, samples })
    }
}

/// Parses the `<K1=V1,K2=V2,...>` grammar from an `##INFO`/`##FORMAT`/
/// `##FILTER`/`##contig` value, respecting double-quoted commas (e.g.
/// `Description="a, b"`).
pub fn parse_bracketed_meta(value: &str) -> Vec<(String, String)> {
    let inner = value.strip_prefix('<').and_then(|v| v.strip_suffix('>')).unwrap_or(value);
    let mut fields = Vec::new();
    let mut field_start = 0usize;
    let mut in_quotes = false;
    let bytes = inner.as_bytes();
    for i in 0..=bytes.len() {
        let at_end = i == bytes.len();
        let is_comma = !at_end && bytes[i] == b',';
        if !at_end && bytes[i] == b'"' {
            in_quotes = !in_quotes;
        }
        if at_end || (is_comma && !in_quotes) {
            let field = &inner[field_start..i];
            if let Some((k, v)) = field.split_once('=') {
                let v = v.trim().trim_matches('"');
                fields.push((k.trim().to_string(), v.to_string()));
            }
            field_start = i + 1;
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_meta_and_column_lines() {
        let header = Header::new(
            vec![
                HeaderLine { key: "fileformat".into(), value: "SAVv2".into() },
                HeaderLine { key: "contig".into(), value: "<ID=20,length=63025520>".into() },
            ],
            vec!["S0".into(), "S1".into()],
        );
        let text = header.render();
        let parsed = Header::parse(&text).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn bracketed_meta_respects_quoted_commas() {
        let fields = parse_bracketed_meta(r#"<ID=DP,Number=1,Type=Integer,Description="Read depth, total">"#);
        assert_eq!(
            fields,
            vec![
                ("ID".to_string(), "DP".to_string()),
                ("Number".to_string(), "1".to_string()),
                ("Type".to_string(), "Integer".to_string()),
                ("Description".to_string(), "Read depth, total".to_string()),
            ]
        );
    }

    #[test]
    fn missing_equals_sign_is_a_corrupt_header() {
        assert!(Header::parse("##bogus\n").is_err());
    }
}
