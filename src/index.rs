//! Secondary index model: sort columns and the index-kind naming scheme.
//!
//! Parses an `[index::<id>]` section and its sort-column mini-grammar,
//! and names index kinds by reserved prefix. Grounded on
//! `schema_sort_column::from_config`/`schema_secondary_index::from_config`
//! (`prinbee/data/schema.cpp` ~lines 1194-1403) for the exact parsing
//! rules: space-separated tokens, `<id>(<length>)` with no space before
//! `(`, `nulls_last`/`without_nulls` mutually exclusive.

use crate::error::{CoreError, Result};
use crate::iniparse::{split_csv, IniSection};

/// Ordering/null-handling flags on one [`SortColumn`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortColumnFlags {
    pub descending: bool,
    pub place_nulls_last: bool,
    pub without_nulls: bool,
}

/// One component of a secondary index's sort key: a column id, a prefix
/// length (bytes), and ordering flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub column_id: u16,
    pub length: u32,
    pub flags: SortColumnFlags,
}

const DEFAULT_SORT_LENGTH: u32 = 256;

impl SortColumn {
    /// Parse one sort-column spec: `<column_id>[(<length>)] [desc]
    /// [nulls_last|without_nulls]`. No space is permitted before the `(`.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let mut words = spec.split_ascii_whitespace();
        let first = words
            .next()
            .ok_or_else(|| CoreError::InvalidParameter("empty sort-column spec".to_string()))?;

        let (id_part, length) = match first.split_once('(') {
            Some((id_part, rest)) => {
                let len_str = rest.strip_suffix(')').ok_or_else(|| {
                    CoreError::InvalidParameter(format!("unterminated length in sort-column spec: {first}"))
                })?;
                let len: u32 = len_str
                    .parse()
                    .map_err(|_| CoreError::InvalidParameter(format!("invalid sort-column length: {len_str}")))?;
                if len == 0 {
                    return Err(CoreError::InvalidParameter(
                        "sort-column length must be a positive 32-bit value".to_string(),
                    ));
                }
                (id_part, len)
            }
            None => (first, DEFAULT_SORT_LENGTH),
        };
        let column_id: u16 = id_part
            .parse()
            .map_err(|_| CoreError::InvalidParameter(format!("invalid sort-column id: {id_part}")))?;

        let mut flags = SortColumnFlags::default();
        for word in words {
            match word {
                "desc" => flags.descending = true,
                "nulls_last" => flags.place_nulls_last = true,
                "without_nulls" => flags.without_nulls = true,
                other => {
                    return Err(CoreError::InvalidParameter(format!(
                        "unknown sort-column flag: {other}"
                    )))
                }
            }
        }
        if flags.place_nulls_last && flags.without_nulls {
            return Err(CoreError::ExclusiveFields(
                "nulls_last and without_nulls are mutually exclusive".to_string(),
            ));
        }

        Ok(Self { column_id, length, flags })
    }
}

/// Flags attached to a [`SecondaryIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexFlags {
    pub without_nulls: bool,
    pub nulls_not_distinct: bool,
    pub distributed: bool,
}

impl IndexFlags {
    pub fn parse(csv: &str) -> Result<Self> {
        let mut flags = IndexFlags::default();
        for word in split_csv(csv) {
            match word.to_ascii_lowercase().as_str() {
                "without_nulls" => flags.without_nulls = true,
                "nulls_not_distinct" => flags.nulls_not_distinct = true,
                "distributed" => flags.distributed = true,
                other => return Err(CoreError::InvalidParameter(format!("unknown index flag: {other}"))),
            }
        }
        Ok(flags)
    }
}

/// A secondary index: an ordered, non-empty list of sort columns plus
/// optional compiled key/filter scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndex {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub flags: IndexFlags,
    pub sort_columns: Vec<SortColumn>,
    pub key_script: Option<Vec<u8>>,
    pub filter_script: Option<Vec<u8>>,
}

impl SecondaryIndex {
    /// Parse an `[index::<id>]` section.
    pub fn from_config(section: &IniSection) -> Result<Self> {
        let id: u32 = section
            .id
            .as_deref()
            .ok_or_else(|| CoreError::MissingParameter("index id".to_string()))?
            .parse()
            .map_err(|_| CoreError::InvalidParameter("index id must be a 32-bit integer".to_string()))?;
        if id == 0 {
            return Err(CoreError::InvalidParameter("index id must be non-zero".to_string()));
        }

        let name = section.require("name")?.to_string();
        crate::column::validate_user_name(&name)?;

        let columns_csv = section.require("columns")?;
        let sort_columns: Vec<SortColumn> = split_csv(columns_csv)
            .iter()
            .map(|spec| SortColumn::from_spec(spec))
            .collect::<Result<_>>()?;
        if sort_columns.is_empty() {
            return Err(CoreError::MissingParameter(
                "index must have at least one sort column".to_string(),
            ));
        }

        let flags = match section.get("flags") {
            Some(csv) => IndexFlags::parse(csv)?,
            None => IndexFlags::default(),
        };

        Ok(Self {
            id,
            name,
            description: section.get("description").map(str::to_string),
            flags,
            sort_columns,
            key_script: section.get("key_script").map(|s| s.as_bytes().to_vec()),
            filter_script: section.get("filter_script").map(|s| s.as_bytes().to_vec()),
        })
    }
}

/// The recognized kinds of index, keyed by reserved name prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Indirect,
    Primary,
    Expiration,
    Tree,
    Secondary,
    Invalid,
}

/// Classify an index name into its [`IndexKind`].
pub fn index_kind_from_name(name: &str) -> IndexKind {
    match name {
        "_indirect" => IndexKind::Indirect,
        "_primary" => IndexKind::Primary,
        "_expiration" => IndexKind::Expiration,
        "_tree" => IndexKind::Tree,
        _ if crate::column::validate_user_name(name).is_ok() => IndexKind::Secondary,
        _ => IndexKind::Invalid,
    }
}

/// The persisted name for a reserved index kind; `SECONDARY` has no fixed
/// name (the name is user-supplied), so this returns an empty string.
pub fn to_name(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Indirect => "_indirect",
        IndexKind::Primary => "_primary",
        IndexKind::Expiration => "_expiration",
        IndexKind::Tree => "_tree",
        IndexKind::Secondary => "",
        IndexKind::Invalid => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_length_desc_nulls_last() {
        let sc = SortColumn::from_spec("1(32) desc nulls_last").unwrap();
        assert_eq!(sc.column_id, 1);
        assert_eq!(sc.length, 32);
        assert!(sc.flags.descending);
        assert!(sc.flags.place_nulls_last);
        assert!(!sc.flags.without_nulls);
    }

    #[test]
    fn default_length_is_256() {
        let sc = SortColumn::from_spec("4").unwrap();
        assert_eq!(sc.length, 256);
    }

    #[test]
    fn nulls_last_and_without_nulls_are_exclusive() {
        let err = SortColumn::from_spec("1 nulls_last without_nulls").unwrap_err();
        assert!(matches!(err, CoreError::ExclusiveFields(_)));
    }

    #[test]
    fn index_kind_recognizes_reserved_prefixes() {
        assert_eq!(index_kind_from_name("_primary"), IndexKind::Primary);
        assert_eq!(index_kind_from_name("idx_date"), IndexKind::Secondary);
        assert_eq!(index_kind_from_name(""), IndexKind::Invalid);
    }
}
