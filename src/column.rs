//! Column model: one user- or system-defined field of a table schema.
//!
//! Parses a `[column::<id>]` section, following `schema.cpp`'s
//! `schema_column::from_config` for the exact set of optional keys and
//! their validation (`internal_size_limit` of -1 or ≥128, `expiration_date`
//! must be a time type).

use crate::complextype::{BasicType, TypeRef};
use crate::error::{CoreError, Result};
use crate::iniparse::{split_csv, IniSection};
use rustc_hash::FxHashMap;

/// Flags attached to a column (BLOB, HIDDEN, LIMITED, REQUIRED,
/// SYSTEM, VERSIONED). `SYSTEM` is never user-settable; it is assigned by
/// [`crate::schema::Schema`] when injecting the fixed system-column set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    pub blob: bool,
    pub hidden: bool,
    pub limited: bool,
    pub required: bool,
    pub system: bool,
    pub versioned: bool,
}

impl ColumnFlags {
    /// Parse a comma list drawn from `{blob, hidden, limited, required,
    /// versioned}`. `system` is never accepted from text input.
    pub fn parse(csv: &str) -> Result<Self> {
        let mut flags = ColumnFlags::default();
        for word in split_csv(csv) {
            match word.to_ascii_lowercase().as_str() {
                "blob" => flags.blob = true,
                "hidden" => flags.hidden = true,
                "limited" => flags.limited = true,
                "required" => flags.required = true,
                "versioned" => flags.versioned = true,
                other => return Err(CoreError::InvalidParameter(format!("unknown column flag: {other}"))),
            }
        }
        Ok(flags)
    }
}

/// A reserved system column, injected unconditionally before user columns
/// are parsed.
pub const SYSTEM_COLUMN_NAMES: &[&str] = &[
    "_schema_version",
    "_oid",
    "_version",
    "_language",
    "_created_on",
    "_last_updated",
    "_deleted_on",
    "_created_by",
    "_last_updated_by",
    "_deleted_by",
];

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: u16,
    pub name: String,
    pub type_ref: TypeRef,
    pub flags: ColumnFlags,
    pub description: Option<String>,
    pub encrypt: Option<String>,
    pub default_value: Option<Vec<u8>>,
    pub default_value_script: Option<Vec<u8>>,
    pub validation_script: Option<Vec<u8>>,
    pub minimum_value: Option<Vec<u8>>,
    pub maximum_value: Option<Vec<u8>>,
    pub minimum_size: Option<u64>,
    pub maximum_size: Option<u64>,
    /// -1 means unlimited; any other stored value is `>= 128`.
    pub internal_size_limit: i64,
}

/// Validate an identifier: non-empty, and (for user-defined names) not
/// starting with `_` (the reserved system-name prefix).
pub fn validate_user_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidName("column name must not be empty".to_string()));
    }
    if name.starts_with('_') {
        return Err(CoreError::InvalidName(format!(
            "user-defined name {name} must not begin with '_'"
        )));
    }
    if !name.chars().next().unwrap().is_ascii_alphabetic() {
        return Err(CoreError::InvalidName(format!(
            "name {name} must start with a letter"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::InvalidName(format!(
            "name {name} contains invalid characters"
        )));
    }
    Ok(())
}

impl Column {
    /// Build a system column with an otherwise-default shape. System
    /// columns are exempt from the `_`-prefix user-name check.
    pub fn system(id: u16, name: &str, type_ref: TypeRef) -> Self {
        Self {
            id,
            name: name.to_string(),
            type_ref,
            flags: ColumnFlags { system: true, ..Default::default() },
            description: None,
            encrypt: None,
            default_value: None,
            default_value_script: None,
            validation_script: None,
            minimum_value: None,
            maximum_value: None,
            minimum_size: None,
            maximum_size: None,
            internal_size_limit: -1,
        }
    }

    /// Parse a `[column::<id>]` section.
    pub fn from_config(section: &IniSection, complex_types: &FxHashMap<String, crate::complextype::ComplexType>) -> Result<Self> {
        let id: u16 = section
            .id
            .as_deref()
            .ok_or_else(|| CoreError::MissingParameter("column id".to_string()))?
            .parse()
            .map_err(|_| CoreError::InvalidParameter("column id must be a 16-bit integer".to_string()))?;
        if id == 0 {
            return Err(CoreError::InvalidParameter("column id 0 is reserved for NULL".to_string()));
        }

        let name = section.require("name")?.to_string();
        validate_user_name(&name)?;

        let type_name = section.require("type")?;
        let type_ref = TypeRef::parse(type_name, complex_types)?;
        if name == "expiration_date" {
            if !matches!(&type_ref, TypeRef::Basic(b) if b.is_time()) {
                return Err(CoreError::TypeMismatch {
                    field: "expiration_date".to_string(),
                    expected: "a time type",
                    found: "non-time type",
                });
            }
        }

        let flags = match section.get("flags") {
            Some(csv) => ColumnFlags::parse(csv)?,
            None => ColumnFlags::default(),
        };

        let internal_size_limit = match section.get("internal_size_limit") {
            Some(s) => {
                let v: i64 = s
                    .parse()
                    .map_err(|_| CoreError::InvalidParameter("internal_size_limit must be an integer".to_string()))?;
                if v != -1 && v < 128 {
                    return Err(CoreError::InvalidParameter(
                        "internal_size_limit must be -1 or >= 128".to_string(),
                    ));
                }
                v
            }
            None => -1,
        };

        let minimum_size = parse_opt_u64(section.get("minimum_size"), "minimum_size")?;
        let maximum_size = parse_opt_u64(section.get("maximum_size"), "maximum_size")?;

        Ok(Self {
            id,
            name,
            type_ref,
            flags,
            description: section.get("description").map(str::to_string),
            encrypt: section.get("encrypt").map(str::to_string),
            default_value: section.get("default_value").map(|s| s.as_bytes().to_vec()),
            default_value_script: section.get("default_value_script").map(|s| s.as_bytes().to_vec()),
            validation_script: section.get("validation_script").map(|s| s.as_bytes().to_vec()),
            minimum_value: section.get("minimum_value").map(|s| s.as_bytes().to_vec()),
            maximum_value: section.get("maximum_value").map(|s| s.as_bytes().to_vec()),
            minimum_size,
            maximum_size,
            internal_size_limit,
        })
    }

    /// Structural comparison: does this field's difference from `other`
    /// require a `DIFFER` (migration) rather than a soft `UPDATE`?
    pub fn differs_structurally_from(&self, other: &Column) -> bool {
        self.type_ref != other.type_ref
            || self.minimum_value != other.minimum_value
            || self.maximum_value != other.maximum_value
            || self.minimum_size != other.minimum_size
            || self.maximum_size != other.maximum_size
            || self.validation_script != other.validation_script
            || non_limited_flags(self.flags) != non_limited_flags(other.flags)
    }

    /// Whether this column differs from `other` only in soft (non-migration)
    /// ways: the `LIMITED` flag or `default_value`.
    pub fn differs_softly_from(&self, other: &Column) -> bool {
        self.flags.limited != other.flags.limited || self.default_value != other.default_value
    }
}

fn non_limited_flags(f: ColumnFlags) -> (bool, bool, bool, bool, bool) {
    (f.blob, f.hidden, f.required, f.system, f.versioned)
}

fn parse_opt_u64(value: Option<&str>, field: &'static str) -> Result<Option<u64>> {
    match value {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| CoreError::InvalidParameter(format!("{field} must be a non-negative integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iniparse::parse;

    #[test]
    fn expiration_date_requires_time_type() {
        let ini = parse("[column::5]\nname=expiration_date\ntype=UINT32\n").unwrap();
        let types = FxHashMap::default();
        let err = Column::from_config(&ini.sections[0], &types).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn internal_size_limit_below_128_rejected() {
        let ini = parse("[column::1]\nname=login\ntype=P8STRING\ninternal_size_limit=10\n").unwrap();
        let types = FxHashMap::default();
        assert!(Column::from_config(&ini.sections[0], &types).is_err());
    }

    #[test]
    fn user_name_cannot_start_with_underscore() {
        assert!(validate_user_name("_oid").is_err());
        assert!(validate_user_name("login").is_ok());
    }

    #[test]
    fn valid_column_parses() {
        let ini = parse("[column::1]\nname=login\ntype=P8STRING\nflags=required\n").unwrap();
        let types = FxHashMap::default();
        let col = Column::from_config(&ini.sections[0], &types).unwrap();
        assert_eq!(col.id, 1);
        assert!(col.flags.required);
        assert_eq!(col.type_ref, TypeRef::Basic(BasicType::P8String));
    }
}
