/// The `Number=` cardinality declared on an `INFO`/`FORMAT` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Count(u32),
    NumAltAlleles,
    NumAlleles,
    NumGenotypes,
    Unknown,
}

/// The `Type=` value type declared on an `INFO`/`FORMAT` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Integer,
    Float,
    String,
    Character,
    Flag,
}

/// One resolved dictionary slot: the registered name plus whatever
/// `Number=`/`Type=` metadata accompanied it (populated for `id` entries
/// sourced from `INFO`/`FORMAT` header lines; `None` for contig and sample
/// entries, which carry no such metadata).
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub number: Option<Number>,
    pub value_type: Option<DeclaredType>,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), number: None, value_type: None }
    }

    pub fn with_metadata(name: impl Into<String>, number: Number, value_type: DeclaredType) -> Self {
        Self { name: name.into(), number: Some(number), value_type: Some(value_type) }
    }
}
