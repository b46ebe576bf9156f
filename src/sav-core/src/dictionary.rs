//! Builds the three `sav_dictionary::Dictionary` namespaces from header meta
//! lines, and registers `_PBWT_SORT_*` descriptors as PBWT-tracked FORMAT
//! keys.

use ahash::AHashSet;

use sav_dictionary::{DeclaredType, Dictionary, Entry, Number};

use crate::error::SavError;
use crate::header::{parse_bracketed_meta, Header};

const PBWT_SORT_PREFIX: &str = "_PBWT_SORT_";

/// The dictionary plus the set of FORMAT-key codes that are PBWT-reordered.
pub struct DictionaryBundle {
    pub dictionary: Dictionary,
    pub pbwt_targets: AHashSet<u32>,
}

fn parse_number(s: &str) -> Number {
    match s {
        "A" => Number::NumAltAlleles,
        "R" => Number::NumAlleles,
        "G" => Number::NumGenotypes,
        "." => Number::Unknown,
        n => n.parse().map(Number::Count).unwrap_or(Number::Unknown),
    }
}

fn parse_declared_type(s: &str) -> DeclaredType {
    match s {
        "Integer" => DeclaredType::Integer,
        "Float" => DeclaredType::Float,
        "Character" => DeclaredType::Character,
        "Flag" => DeclaredType::Flag,
        _ => DeclaredType::String,
    }
}

/// Builds dictionaries from a parsed header: `##contig` lines seed `contig`,
/// `##FILTER`/`##INFO`/`##FORMAT` lines seed the shared `id` namespace
/// (`PASS` already pre-populated at code 0), and the sample column seeds
/// `sample` in file order.
pub fn build(header: &Header) -> Result<DictionaryBundle, SavError> {
    let mut dictionary = Dictionary::new();
    let mut pbwt_targets_by_name: Vec<(String, String)> = Vec::new();

    for line in &header.lines {
        match line.key.as_str() {
            "contig" => {
                let fields = parse_bracketed_meta(&line.value);
                let id = field(&fields, "ID").ok_or_else(|| SavError::CorruptHeader("##contig missing ID".into()))?;
                register(&mut dictionary.contig, &fields, id, Entry::new(id))?;
            }
            "FILTER" => {
                let fields = parse_bracketed_meta(&line.value);
                let id = field(&fields, "ID").ok_or_else(|| SavError::CorruptHeader("##FILTER missing ID".into()))?;
                register(&mut dictionary.id, &fields, id, Entry::new(id))?;
            }
            "INFO" | "FORMAT" => {
                let fields = parse_bracketed_meta(&line.value);
                let id = field(&fields, "ID").ok_or_else(|| SavError::CorruptHeader("INFO/FORMAT missing ID".into()))?;
                let number = field(&fields, "Number").map(parse_number).unwrap_or(Number::Unknown);
                let value_type = field(&fields, "Type").map(parse_declared_type).unwrap_or(DeclaredType::String);
                let entry = Entry::with_metadata(id, number, value_type);
                register(&mut dictionary.id, &fields, id, entry)?;

                if line.key == "INFO" {
                    if let Some(target) = id.strip_prefix(PBWT_SORT_PREFIX) {
                        if let Some(fmt_key) = field(&fields, "Format") {
                            pbwt_targets_by_name.push((fmt_key.to_string(), target.to_string()));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    for sample in &header.samples {
        dictionary.sample.insert(Entry::new(sample.clone()))?;
    }

    let mut pbwt_targets = AHashSet::default();
    for (fmt_key, _reset_suffix) in pbwt_targets_by_name {
        if let Some(code) = dictionary.id.code_of(&fmt_key) {
            pbwt_targets.insert(code);
        }
    }

    Ok(DictionaryBundle { dictionary, pbwt_targets })
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn register(table: &mut sav_dictionary::Table, fields: &[(String, String)], id: &str, entry: Entry) -> Result<(), SavError> {
    if let Some(idx) = field(fields, "IDX") {
        let idx: u32 = idx.parse().map_err(|_| SavError::CorruptHeader(format!("IDX on {id:?} is not an integer")))?;
        table.insert_at(idx, entry)?;
    } else {
        table.insert(entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderLine;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_dictionary_and_registers_pbwt_target() {
        let header = Header::new(
            vec![
                HeaderLine { key: "contig".into(), value: "<ID=20>".into() },
                HeaderLine { key: "FORMAT".into(), value: "<ID=GT,Number=1,Type=Integer>".into() },
                HeaderLine { key: "INFO".into(), value: "<ID=_PBWT_SORT_GT,Number=0,Type=Flag,Format=GT>".into() },
            ],
            vec!["S0".into()],
        );
        let bundle = build(&header).unwrap();
        assert_eq!(bundle.dictionary.contig.code_of("20"), Some(0));
        let gt_code = bundle.dictionary.id.code_of("GT").unwrap();
        assert!(bundle.pbwt_targets.contains(&gt_code));
    }
}
