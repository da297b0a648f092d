//! Basic type vocabulary and user-defined complex types (records, enums).
//!
//! A column's type is either a basic scalar or a reference to a named
//! complex type. Grounded on `schema.cpp`'s `schema_complex_type`
//! (`fields=` vs `enum=`, mutually exclusive — `ExclusiveFields`). Cycle
//! detection is DFS with a three-color mark, reported as
//! [`CoreError::TypeCycle`].

use crate::error::{CoreError, Result};
use crate::iniparse::{parse as parse_ini, split_csv, IniSection};
use rustc_hash::FxHashMap;

/// A basic scalar type, independent of any user-defined complex type. Named
/// identically to [`crate::fieldtype::FieldType`]'s scalar variants, since
/// both vocabularies describe the same set of primitive wire shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bits,
    Version,
    Time,
    MsTime,
    UsTime,
    NsTime,
    Reference,
    Oid,
    P8String,
    P16String,
    Buffer8,
    Buffer16,
    Buffer32,
}

impl BasicType {
    /// Case-insensitive lookup by the `.ini` spelling (`UINT32`, `p8string`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "INT8" => BasicType::Int8,
            "INT16" => BasicType::Int16,
            "INT32" => BasicType::Int32,
            "INT64" => BasicType::Int64,
            "UINT8" => BasicType::UInt8,
            "UINT16" => BasicType::UInt16,
            "UINT32" => BasicType::UInt32,
            "UINT64" => BasicType::UInt64,
            "BITS" => BasicType::Bits,
            "VERSION" => BasicType::Version,
            "TIME" => BasicType::Time,
            "MSTIME" => BasicType::MsTime,
            "USTIME" => BasicType::UsTime,
            "NSTIME" => BasicType::NsTime,
            "REFERENCE" => BasicType::Reference,
            "OID" => BasicType::Oid,
            "P8STRING" => BasicType::P8String,
            "P16STRING" => BasicType::P16String,
            "BUFFER8" => BasicType::Buffer8,
            "BUFFER16" => BasicType::Buffer16,
            "BUFFER32" => BasicType::Buffer32,
            _ => return None,
        })
    }

    /// Whether this type is a valid underlying integer type for an enum
    /// (`[INT8..UINT64]`).
    pub fn is_enum_underlying(self) -> bool {
        matches!(
            self,
            BasicType::Int8
                | BasicType::Int16
                | BasicType::Int32
                | BasicType::Int64
                | BasicType::UInt8
                | BasicType::UInt16
                | BasicType::UInt32
                | BasicType::UInt64
        )
    }

    pub fn is_time(self) -> bool {
        matches!(
            self,
            BasicType::Time | BasicType::MsTime | BasicType::UsTime | BasicType::NsTime
        )
    }
}

/// A column or record-field type: either a basic scalar or a named
/// reference into the shared complex-type registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Basic(BasicType),
    Complex(String),
}

impl TypeRef {
    /// Resolve a `.ini` type name against the basic vocabulary first, then
    /// the registry of complex types known so far. The complex-type map
    /// must be populated before column parsing runs.
    pub fn parse(name: &str, complex_types: &FxHashMap<String, ComplexType>) -> Result<Self> {
        if let Some(basic) = BasicType::parse(name) {
            return Ok(TypeRef::Basic(basic));
        }
        if complex_types.contains_key(name) {
            return Ok(TypeRef::Complex(name.to_string()));
        }
        Err(CoreError::InvalidType(name.to_string()))
    }
}

/// One field of a record complex type: `(name, type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub name: String,
    pub type_ref: TypeRef,
}

/// One named value of an enum complex type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexTypeKind {
    Record(Vec<RecordField>),
    Enum {
        underlying: BasicType,
        variants: Vec<EnumVariant>,
    },
}

/// A user-defined named aggregate (record) or enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    pub name: String,
    pub kind: ComplexTypeKind,
}

impl ComplexType {
    /// Build a record type, validating unique field names and that no type
    /// name collides with a basic type.
    pub fn new_record(name: &str, fields: Vec<RecordField>) -> Result<Self> {
        Self::reject_basic_name(name)?;
        let mut seen = std::collections::HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.clone()) {
                return Err(CoreError::InvalidParameter(format!(
                    "duplicate field name {} in complex type {name}",
                    f.name
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            kind: ComplexTypeKind::Record(fields),
        })
    }

    /// Build an enum type, validating the underlying type and unique
    /// names/values.
    pub fn new_enum(name: &str, underlying: BasicType, variants: Vec<EnumVariant>) -> Result<Self> {
        Self::reject_basic_name(name)?;
        if !underlying.is_enum_underlying() {
            return Err(CoreError::InvalidType(format!(
                "enum {name} underlying type must be an integer type in [INT8..UINT64]"
            )));
        }
        let mut names = std::collections::HashSet::new();
        let mut values = std::collections::HashSet::new();
        for v in &variants {
            if !names.insert(v.name.clone()) {
                return Err(CoreError::InvalidParameter(format!(
                    "duplicate enum variant name {} in {name}",
                    v.name
                )));
            }
            if !values.insert(v.value) {
                return Err(CoreError::InvalidParameter(format!(
                    "duplicate enum variant value {} in {name}",
                    v.value
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            kind: ComplexTypeKind::Enum { underlying, variants },
        })
    }

    fn reject_basic_name(name: &str) -> Result<()> {
        if BasicType::parse(name).is_some() {
            return Err(CoreError::InvalidName(format!(
                "complex type name {name} collides with a basic type"
            )));
        }
        Ok(())
    }

    /// Parse a `[type::<name>]` section: `fields=<name type, ...>` builds a
    /// record, `enum=<name value, ...>` (with optional `enum_type=`) builds
    /// an enum; the two are mutually exclusive. Complex-type field
    /// references are accepted without checking the referenced type exists
    /// yet — `[type::*]` sections may refer to each other in any order, so
    /// existence and cycles are both checked once every section in the
    /// file has been parsed, by [`load_complex_types`].
    pub fn from_config(section: &IniSection) -> Result<Self> {
        let name = section
            .id
            .as_deref()
            .ok_or_else(|| CoreError::MissingParameter("complex type name".to_string()))?
            .to_string();

        let fields_csv = section.get("fields");
        let enum_csv = section.get("enum");
        if fields_csv.is_some() && enum_csv.is_some() {
            return Err(CoreError::ExclusiveFields(format!(
                "complex type {name} cannot have both fields= and enum= defined"
            )));
        }

        if let Some(enum_csv) = enum_csv {
            let underlying = match section.get("enum_type") {
                Some(t) => BasicType::parse(t)
                    .ok_or_else(|| CoreError::InvalidType(format!("unknown enum_type {t} in type {name}")))?,
                None => BasicType::UInt64,
            };
            let mut variants = Vec::new();
            for entry in split_csv(enum_csv) {
                let mut parts = entry.split_whitespace();
                let vname = parts
                    .next()
                    .ok_or_else(|| CoreError::InvalidParameter(format!("empty enum entry in type {name}")))?;
                let vvalue = parts.next().ok_or_else(|| {
                    CoreError::InvalidParameter(format!("enum entry {vname} in type {name} is missing a value"))
                })?;
                if parts.next().is_some() {
                    return Err(CoreError::InvalidParameter(format!(
                        "enum entry \"{entry}\" in type {name} must be exactly \"name value\""
                    )));
                }
                let value: i64 = vvalue.parse().map_err(|_| {
                    CoreError::InvalidParameter(format!("enum value {vvalue} in type {name} is not an integer"))
                })?;
                variants.push(EnumVariant { name: vname.to_string(), value });
            }
            return ComplexType::new_enum(&name, underlying, variants);
        }

        let fields_csv = fields_csv.ok_or_else(|| {
            CoreError::MissingParameter(format!("complex type {name} must have fields= or enum= defined"))
        })?;
        let mut fields = Vec::new();
        for entry in split_csv(fields_csv) {
            let mut parts = entry.split_whitespace();
            let fname = parts
                .next()
                .ok_or_else(|| CoreError::InvalidParameter(format!("empty field entry in type {name}")))?;
            let ftype = parts.next().ok_or_else(|| {
                CoreError::InvalidParameter(format!("field {fname} in type {name} is missing a type"))
            })?;
            if parts.next().is_some() {
                return Err(CoreError::InvalidParameter(format!(
                    "field entry \"{entry}\" in type {name} must be exactly \"name type\""
                )));
            }
            let type_ref = match BasicType::parse(ftype) {
                Some(basic) => TypeRef::Basic(basic),
                None => TypeRef::Complex(ftype.to_string()),
            };
            fields.push(RecordField { name: fname.to_string(), type_ref });
        }
        ComplexType::new_record(&name, fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validate that the record-field type graph among `types` contains no
/// cycles. Run as a second pass after every complex type name is known
/// (DFS-with-color).
pub fn validate_no_cycles(types: &FxHashMap<String, ComplexType>) -> Result<()> {
    let mut marks: FxHashMap<&str, Mark> = types.keys().map(|k| (k.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        name: &'a str,
        types: &'a FxHashMap<String, ComplexType>,
        marks: &mut FxHashMap<&'a str, Mark>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(CoreError::TypeCycle(name.to_string()));
            }
            _ => {}
        }
        marks.insert(name, Mark::InProgress);
        if let Some(ComplexType {
            kind: ComplexTypeKind::Record(fields),
            ..
        }) = types.get(name)
        {
            for f in fields {
                if let TypeRef::Complex(dep) = &f.type_ref {
                    visit(dep, types, marks)?;
                }
            }
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for name in types.keys() {
        visit(name, types, &mut marks)?;
    }
    Ok(())
}

/// Load every `[type::<name>]` section of a complex-type definition file
/// into a name-keyed registry, suitable for passing to
/// [`crate::schema::Schema::from_config`]. Record field references to
/// other complex types are resolved against the full registry after every
/// section has been parsed, and the resulting graph is checked for cycles.
pub fn load_complex_types(text: &str) -> Result<FxHashMap<String, ComplexType>> {
    let ini = parse_ini(text)?;
    let mut types = FxHashMap::default();
    for section in ini.sections_of_kind("type") {
        let complex_type = ComplexType::from_config(section)?;
        if types.contains_key(&complex_type.name) {
            return Err(CoreError::InvalidName(format!(
                "complex type {} defined twice",
                complex_type.name
            )));
        }
        types.insert(complex_type.name.clone(), complex_type);
    }

    for complex_type in types.values() {
        if let ComplexTypeKind::Record(fields) = &complex_type.kind {
            for field in fields {
                if let TypeRef::Complex(dep) = &field.type_ref {
                    if !types.contains_key(dep) {
                        return Err(CoreError::MissingParameter(format!(
                            "type {} references unknown complex type {dep}",
                            complex_type.name
                        )));
                    }
                }
            }
        }
    }

    validate_no_cycles(&types)?;
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_rejects_duplicate_field_names() {
        let fields = vec![
            RecordField { name: "a".into(), type_ref: TypeRef::Basic(BasicType::UInt8) },
            RecordField { name: "a".into(), type_ref: TypeRef::Basic(BasicType::UInt8) },
        ];
        assert!(ComplexType::new_record("point", fields).is_err());
    }

    #[test]
    fn enum_rejects_non_integer_underlying() {
        let err = ComplexType::new_enum("color", BasicType::P8String, vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn cycle_detected_between_two_records() {
        let mut types = FxHashMap::default();
        types.insert(
            "a".to_string(),
            ComplexType {
                name: "a".into(),
                kind: ComplexTypeKind::Record(vec![RecordField {
                    name: "b_field".into(),
                    type_ref: TypeRef::Complex("b".into()),
                }]),
            },
        );
        types.insert(
            "b".to_string(),
            ComplexType {
                name: "b".into(),
                kind: ComplexTypeKind::Record(vec![RecordField {
                    name: "a_field".into(),
                    type_ref: TypeRef::Complex("a".into()),
                }]),
            },
        );
        assert!(validate_no_cycles(&types).is_err());
    }

    #[test]
    fn acyclic_graph_passes() {
        let mut types = FxHashMap::default();
        types.insert(
            "leaf".to_string(),
            ComplexType {
                name: "leaf".into(),
                kind: ComplexTypeKind::Record(vec![]),
            },
        );
        types.insert(
            "root".to_string(),
            ComplexType {
                name: "root".into(),
                kind: ComplexTypeKind::Record(vec![RecordField {
                    name: "child".into(),
                    type_ref: TypeRef::Complex("leaf".into()),
                }]),
            },
        );
        assert!(validate_no_cycles(&types).is_ok());
    }
}
