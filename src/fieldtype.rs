//! Field types and the static description list that drives the structure
//! engine.
//!
//! Grounded on `prinbee/data/schema.cpp`'s `struct_description_t` tables
//! (e.g. the secondary-index description in `block_secondary_index.cpp`)
//! and on the bit-packing idiom in `util.rs`/`page.rs` (`getbits!`/
//! `setbits!` on a combined header word). This is modeled as a tagged sum
//! over concrete typed variants rather than a raw type-code plus
//! reinterpret casts.

/// One named, fixed-width sub-field packed inside a `Bits` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSubField {
    pub name: String,
    pub width: u32,
}

/// The type of one field in a [`Description`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// First field of every description: a 4-byte `dbtype_t` magic tag.
    Magic,
    /// Second field of every description: the structure version (u16 in [`Description`] terms).
    StructureVersion,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// An `n`-bit word packed with named sub-fields (slash-list syntax).
    Bits { width: u32, subfields: Vec<BitSubField> },
    /// `(major: u16, minor: u16)`.
    Version,
    /// 64-bit epoch seconds.
    Time,
    /// 64-bit epoch milliseconds.
    MsTime,
    /// 64-bit epoch microseconds.
    UsTime,
    /// 64-bit epoch nanoseconds.
    NsTime,
    /// 64-bit absolute file offset.
    Reference,
    /// 64-bit opaque identifier.
    Oid,
    /// Length-prefixed (8-bit length) UTF-8 string.
    P8String,
    /// Length-prefixed (16-bit length) UTF-8 string.
    P16String,
    /// Length-prefixed (8-bit length) raw buffer.
    Buffer8,
    /// Length-prefixed (16-bit length) raw buffer.
    Buffer16,
    /// Length-prefixed (32-bit length) raw buffer.
    Buffer32,
    /// Count-prefixed (8-bit count) repeated sub-structure.
    Array8(Box<Description>),
    /// Count-prefixed (16-bit count) repeated sub-structure.
    Array16(Box<Description>),
    /// Count-prefixed (32-bit count) repeated sub-structure.
    Array32(Box<Description>),
    /// An inline nested record.
    Structure(Box<Description>),
    /// Sentinel that must terminate every description list.
    End,
}

impl FieldType {
    /// Static byte width of the type, or `None` for variable-width types
    /// (strings, buffers, arrays, nested structures).
    pub fn static_width(&self) -> Option<u64> {
        match self {
            FieldType::Magic => Some(4),
            FieldType::StructureVersion => Some(2),
            FieldType::Int8 | FieldType::UInt8 => Some(1),
            FieldType::Int16 | FieldType::UInt16 => Some(2),
            FieldType::Int32 | FieldType::UInt32 => Some(4),
            FieldType::Int64 | FieldType::UInt64 => Some(8),
            FieldType::Bits { width, .. } => Some((*width as u64 + 7) / 8),
            FieldType::Version => Some(4),
            FieldType::Time | FieldType::MsTime | FieldType::UsTime | FieldType::NsTime => Some(8),
            FieldType::Reference => Some(8),
            FieldType::Oid => Some(8),
            FieldType::Structure(d) if d.is_fully_static() => Some(d.static_size()),
            _ => None,
        }
    }

    /// Human-readable name used in `CoreError::TypeMismatch` messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldType::Magic => "magic",
            FieldType::StructureVersion => "structure_version",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Bits { .. } => "bits",
            FieldType::Version => "version",
            FieldType::Time => "time",
            FieldType::MsTime => "mstime",
            FieldType::UsTime => "ustime",
            FieldType::NsTime => "nstime",
            FieldType::Reference => "reference",
            FieldType::Oid => "oid",
            FieldType::P8String | FieldType::P16String => "string",
            FieldType::Buffer8 | FieldType::Buffer16 | FieldType::Buffer32 => "buffer",
            FieldType::Array8(_) | FieldType::Array16(_) | FieldType::Array32(_) => "array",
            FieldType::Structure(_) => "structure",
            FieldType::End => "end",
        }
    }
}

/// One entry in a [`Description`]: a field's raw name (possibly carrying
/// bit-packing sub-field syntax), its type, and the schema-version range in
/// which it is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The field's own name (the part before `=` for a `Bits` group).
    pub name: String,
    pub field_type: FieldType,
    /// Inclusive minimum structure version carrying this field.
    pub min_version: u32,
    /// Inclusive maximum structure version carrying this field, or `u32::MAX` for "current".
    pub max_version: u32,
}

impl FieldDescriptor {
    /// A field present in every version.
    pub fn always(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            min_version: 0,
            max_version: u32::MAX,
        }
    }

    /// A `Bits` field whose raw name carries slash-list sub-field syntax,
    /// e.g. `"bloom_filter_flags=algorithm:4/renewing"`.
    pub fn bits(raw_name: &str, width: u32, min_version: u32, max_version: u32) -> Self {
        let (group, subfields) = parse_bits_name(raw_name);
        Self {
            name: group,
            field_type: FieldType::Bits { width, subfields },
            min_version,
            max_version,
        }
    }

    /// A field present only in `[min_version, max_version]`.
    pub fn versioned(
        name: impl Into<String>,
        field_type: FieldType,
        min_version: u32,
        max_version: u32,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            min_version,
            max_version,
        }
    }

    /// Whether this field exists in structures stored at `version`.
    pub fn present_at(&self, version: u32) -> bool {
        version >= self.min_version && version <= self.max_version
    }
}

/// Parse a `Bits` field name of the form `group=sub1/sub2:2/sub3`, returning
/// the group name and its ordered sub-fields (default width 1).
///
/// Grounded directly on `block_secondary_index.cpp`'s
/// `"bloom_filter_flags=algorithm:4/renewing"` field name.
pub fn parse_bits_name(raw: &str) -> (String, Vec<BitSubField>) {
    let (group, rest) = match raw.split_once('=') {
        Some((g, r)) => (g.to_string(), r),
        None => return (raw.to_string(), Vec::new()),
    };
    let subfields = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|part| match part.split_once(':') {
            Some((name, width)) => BitSubField {
                name: name.to_string(),
                width: width.parse().unwrap_or(1),
            },
            None => BitSubField {
                name: part.to_string(),
                width: 1,
            },
        })
        .collect();
    (group, subfields)
}

/// A static, ordered list of field descriptors driving a block/structure's
/// binary layout. Begins implicitly with `Magic`/`StructureVersion` for
/// every *block* description (not required for nested sub-descriptions).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Description {
    pub fields: Vec<FieldDescriptor>,
}

impl Description {
    /// Build a description, validating the block-level invariant that a
    /// top-level description begins with `Magic` then `StructureVersion`.
    /// Panics on violation: this is a programming error, not recoverable data.
    pub fn new_block(fields: Vec<FieldDescriptor>) -> Self {
        assert!(
            matches!(fields.first().map(|f| &f.field_type), Some(FieldType::Magic)),
            "block description must start with a MAGIC field"
        );
        assert!(
            matches!(fields.get(1).map(|f| &f.field_type), Some(FieldType::StructureVersion)),
            "block description's second field must be STRUCTURE_VERSION"
        );
        Self { fields }
    }

    /// Build a description for a nested sub-structure (no MAGIC/VERSION requirement).
    pub fn new_nested(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Whether every field in this description (transitively) has a static width.
    pub fn is_fully_static(&self) -> bool {
        self.fields
            .iter()
            .all(|f| !matches!(f.field_type, FieldType::End) && f.field_type.static_width().is_some())
    }

    /// Sum of static field widths, stopping at (not including) the first
    /// dynamic field or the `End` sentinel. This is `get_static_size()`.
    pub fn static_size(&self) -> u64 {
        let mut total = 0u64;
        for f in &self.fields {
            match f.field_type.static_width() {
                Some(w) => total += w,
                None => break,
            }
        }
        total
    }

    pub fn find(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }
}
