//! Table schema: name, columns, primary key, secondary indexes, parsed from
//! a text `.ini` table definition.
//!
//! Grounded on `schema_table::from_config` (`prinbee/data/schema.cpp`)
//! for the file-name/`[table]`-section cross-check and the system-column
//! injection order.

use crate::column::{validate_user_name, Column, SYSTEM_COLUMN_NAMES};
use crate::complextype::{BasicType, ComplexType, TypeRef};
use crate::config::EngineConfig;
use crate::error::{CoreError, Result};
use crate::index::SecondaryIndex;
use crate::iniparse::{parse as parse_ini, split_csv};
use rustc_hash::FxHashMap;

/// Storage-policy tag on a table. `SEQUENCIAL` keeps that exact spelling
/// deliberately: it is the persisted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    Content,
    Data,
    #[default]
    Default,
    Log,
    Queue,
    Sequencial,
    Session,
    Tree,
}

impl Model {
    fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Ok(Model::Default);
        }
        Ok(match name.to_ascii_uppercase().as_str() {
            "CONTENT" => Model::Content,
            "DATA" => Model::Data,
            "DEFAULT" => Model::Default,
            "LOG" => Model::Log,
            "QUEUE" => Model::Queue,
            "SEQUENCIAL" => Model::Sequencial,
            "SESSION" => Model::Session,
            "TREE" => Model::Tree,
            _ => return Err(CoreError::InvalidName(format!("unknown model: {name}"))),
        })
    }
}

/// Table-level flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaFlags {
    pub secure: bool,
    pub translatable: bool,
    pub unlogged: bool,
    pub drop: bool,
}

impl SchemaFlags {
    fn parse(csv: &str) -> Result<Self> {
        let mut flags = SchemaFlags::default();
        for word in split_csv(csv) {
            match word.to_ascii_lowercase().as_str() {
                "secure" => flags.secure = true,
                "translatable" => flags.translatable = true,
                "unlogged" => flags.unlogged = true,
                other => return Err(CoreError::InvalidParameter(format!("unknown table flag: {other}"))),
            }
        }
        Ok(flags)
    }
}

/// Result of [`Schema::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Equal,
    Update,
    Differ,
}

/// A fully parsed table schema.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub version: u32,
    pub added_on: Option<i64>,
    pub description: Option<String>,
    pub replication_factor: u8,
    pub model: Model,
    pub flags: SchemaFlags,
    pub versioned_rows: Option<u64>,
    pub blob_inline_limit: u32,
    pub columns_by_id: FxHashMap<u16, Column>,
    pub columns_by_name: FxHashMap<String, u16>,
    pub primary_key: Vec<u16>,
    pub indexes_by_name: FxHashMap<String, SecondaryIndex>,
    pub indexes_by_id: FxHashMap<u32, SecondaryIndex>,
}

fn next_system_id(used: &mut u16) -> u16 {
    *used += 1;
    *used
}

impl Schema {
    fn inject_system_columns(columns_by_id: &mut FxHashMap<u16, Column>, columns_by_name: &mut FxHashMap<String, u16>, next_id: &mut u16) {
        for name in SYSTEM_COLUMN_NAMES {
            let type_ref = match *name {
                "_schema_version" => TypeRef::Basic(BasicType::UInt32),
                "_oid" => TypeRef::Basic(BasicType::Oid),
                "_version" => TypeRef::Basic(BasicType::UInt32),
                "_language" => TypeRef::Basic(BasicType::UInt16),
                "_created_on" | "_last_updated" | "_deleted_on" => TypeRef::Basic(BasicType::Time),
                "_created_by" | "_last_updated_by" | "_deleted_by" => TypeRef::Basic(BasicType::Oid),
                _ => unreachable!(),
            };
            let id = next_system_id(next_id);
            columns_by_name.insert(name.to_string(), id);
            columns_by_id.insert(id, Column::system(id, name, type_ref));
        }
    }

    /// Parse a complete `.ini` table definition. `file_stem` is the file
    /// name without its `.ini` extension (used to cross-check `<name>-<N>`
    /// against the `[table]` section); `complex_types` must already contain
    /// every complex type this table's columns may reference; `config`
    /// supplies the replication-factor and blob-inline-limit defaults used
    /// when the `[table]` section leaves them unspecified.
    pub fn from_config(
        text: &str,
        file_stem: &str,
        complex_types: &FxHashMap<String, ComplexType>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let ini = parse_ini(text)?;
        let table_section = ini
            .sections
            .iter()
            .find(|s| s.kind == "table")
            .ok_or_else(|| CoreError::MissingParameter("[table] section".to_string()))?;

        let name = table_section.require("name")?.to_string();
        let version: u32 = table_section
            .require("version")?
            .parse()
            .map_err(|_| CoreError::InvalidParameter("version must be a non-zero 32-bit integer".to_string()))?;
        if version == 0 {
            return Err(CoreError::InvalidParameter("schema version must be non-zero".to_string()));
        }

        let (file_name, file_version) = file_stem
            .rsplit_once('-')
            .ok_or_else(|| CoreError::SchemaMismatch(format!("file name {file_stem} must be <name>-<version>")))?;
        if file_name != name {
            return Err(CoreError::SchemaMismatch(format!(
                "file name {file_name} does not match table name {name}"
            )));
        }
        let file_version: u32 = file_version
            .parse()
            .map_err(|_| CoreError::SchemaMismatch(format!("file version suffix {file_version} is not numeric")))?;
        if file_version != version {
            return Err(CoreError::SchemaMismatch(format!(
                "file version {file_version} does not match [table] version {version}"
            )));
        }

        let replication_factor: u8 = match table_section.get("replication") {
            Some(s) => {
                let v: u32 = s
                    .parse()
                    .map_err(|_| CoreError::InvalidParameter("replication must be 1..255".to_string()))?;
                if !(1..=255).contains(&v) {
                    return Err(CoreError::InvalidParameter("replication must be 1..255".to_string()));
                }
                v as u8
            }
            None => config.default_replication_factor,
        };

        let model = Model::parse(table_section.get("model").unwrap_or(""))?;
        let flags = SchemaFlags::parse(table_section.get("flags").unwrap_or(""))?;

        let versioned_rows = match table_section.get("versioned_rows") {
            Some(s) => {
                let v: u64 = s
                    .parse()
                    .map_err(|_| CoreError::InvalidParameter("versioned_rows must be a non-zero integer".to_string()))?;
                if v == 0 {
                    return Err(CoreError::InvalidParameter("versioned_rows must be non-zero".to_string()));
                }
                Some(v)
            }
            None => None,
        };

        let blob_inline_limit = match table_section.get("blob_limit") {
            Some(s) => {
                let v: u32 = s
                    .parse()
                    .map_err(|_| CoreError::InvalidParameter("blob_limit must be 0 or >= 128".to_string()))?;
                if v != 0 && v < 128 {
                    return Err(CoreError::InvalidParameter("blob_limit must be 0 or >= 128".to_string()));
                }
                v
            }
            None => config.default_blob_inline_limit,
        };

        let mut columns_by_id = FxHashMap::default();
        let mut columns_by_name = FxHashMap::default();
        let mut next_system_id_counter: u16 = 0;
        Self::inject_system_columns(&mut columns_by_id, &mut columns_by_name, &mut next_system_id_counter);

        for section in ini.sections_of_kind("column") {
            let column = Column::from_config(section, complex_types)?;
            if columns_by_id.contains_key(&column.id) {
                return Err(CoreError::InvalidParameter(format!(
                    "column id {} defined twice",
                    column.id
                )));
            }
            if columns_by_name.contains_key(&column.name) {
                return Err(CoreError::InvalidName(format!(
                    "column name {} collides with an existing column",
                    column.name
                )));
            }
            columns_by_name.insert(column.name.clone(), column.id);
            columns_by_id.insert(column.id, column);
        }

        let primary_key: Vec<u16> = match table_section.get("primary_key") {
            Some(csv) => split_csv(csv)
                .iter()
                .map(|s| {
                    s.parse::<u16>()
                        .map_err(|_| CoreError::InvalidParameter(format!("invalid primary_key column id: {s}")))
                })
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        for id in &primary_key {
            if !columns_by_id.contains_key(id) {
                return Err(CoreError::MissingParameter(format!(
                    "primary_key references unknown column id {id}"
                )));
            }
        }

        let mut indexes_by_name = FxHashMap::default();
        let mut indexes_by_id = FxHashMap::default();
        for section in ini.sections_of_kind("index") {
            let index = SecondaryIndex::from_config(section)?;
            for sc in &index.sort_columns {
                if !columns_by_id.contains_key(&sc.column_id) {
                    return Err(CoreError::MissingParameter(format!(
                        "index {} references unknown column id {}",
                        index.name, sc.column_id
                    )));
                }
            }
            if indexes_by_id.contains_key(&index.id) {
                return Err(CoreError::InvalidParameter(format!("index id {} defined twice", index.id)));
            }
            if indexes_by_name.contains_key(&index.name) {
                return Err(CoreError::InvalidName(format!(
                    "index name {} defined twice",
                    index.name
                )));
            }
            indexes_by_name.insert(index.name.clone(), index.clone());
            indexes_by_id.insert(index.id, index);
        }

        Ok(Self {
            name,
            version,
            added_on: None,
            description: table_section.get("description").map(str::to_string),
            replication_factor,
            model,
            flags,
            versioned_rows,
            blob_inline_limit,
            columns_by_id,
            columns_by_name,
            primary_key,
            indexes_by_name,
            indexes_by_id,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_schema_version(&self) -> u32 {
        self.version
    }

    pub fn get_primary_key(&self) -> &[u16] {
        &self.primary_key
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns_by_name.get(name).and_then(|id| self.columns_by_id.get(id))
    }

    /// Structural/soft comparison. Names must already be
    /// equal: a name mismatch is a caller error (`LogicError`), not a diff.
    pub fn compare(&self, other: &Schema) -> Result<CompareResult> {
        if self.name != other.name {
            return Err(CoreError::LogicError(format!(
                "cannot compare schemas for different tables ({} vs {})",
                self.name, other.name
            )));
        }
        let differ = |reason: &str| {
            #[cfg(feature = "trace")]
            println!("schema: {} -> {} requires DIFFER ({reason})", self.name, other.name);
            #[cfg(not(feature = "trace"))]
            let _ = reason;
            CompareResult::Differ
        };
        if self.primary_key != other.primary_key {
            return Ok(differ("primary key changed"));
        }
        if self.columns_by_id.len() != other.columns_by_id.len() {
            return Ok(differ("column count changed"));
        }
        let mut soft = false;
        for (id, col) in &self.columns_by_id {
            let Some(other_col) = other.columns_by_id.get(id) else {
                return Ok(differ("column removed"));
            };
            if col.differs_structurally_from(other_col) {
                return Ok(differ("column changed structurally"));
            }
            if col.differs_softly_from(other_col) {
                soft = true;
            }
        }

        if self.indexes_by_id.len() != other.indexes_by_id.len() {
            return Ok(differ("index count changed"));
        }
        for (id, idx) in &self.indexes_by_id {
            let Some(other_idx) = other.indexes_by_id.get(id) else {
                return Ok(differ("index removed"));
            };
            if idx.name != other_idx.name
                || idx.flags != other_idx.flags
                || idx.sort_columns != other_idx.sort_columns
            {
                return Ok(differ("index definition changed"));
            }
        }

        if self.model != other.model {
            soft = true;
        }

        Ok(if soft { CompareResult::Update } else { CompareResult::Equal })
    }
}

/// Reject a user-supplied identifier that collides with a reserved system
/// column name or the `_` prefix (re-exported for callers of `validate_user_name`).
pub fn validate_column_name(name: &str) -> Result<()> {
    if SYSTEM_COLUMN_NAMES.contains(&name) {
        return Err(CoreError::InvalidName(format!(
            "{name} collides with a system column"
        )));
    }
    validate_user_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_ini() -> &'static str {
        "[table]\nname=users\nversion=3\nprimary_key=1\n\n\
         [column::1]\nname=name\ntype=P8STRING\nflags=required\n\n\
         [column::2]\nname=created\ntype=MSTIME\n"
    }

    #[test]
    fn loads_users_schema_scenario() {
        let types = FxHashMap::default();
        let schema = Schema::from_config(users_ini(), "users-3", &types, &EngineConfig::default()).unwrap();
        assert_eq!(schema.get_name(), "users");
        assert_eq!(schema.get_schema_version(), 3);
        assert_eq!(schema.get_primary_key(), &[1]);
        assert!(schema.get_column("_oid").is_some());
        assert!(schema.get_column("name").unwrap().flags.required);
        assert_eq!(schema.replication_factor, EngineConfig::default().default_replication_factor);
        assert_eq!(schema.blob_inline_limit, EngineConfig::default().default_blob_inline_limit);
    }

    #[test]
    fn file_name_mismatch_is_schema_mismatch() {
        let types = FxHashMap::default();
        let err = Schema::from_config(users_ini(), "users-4", &types, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::SchemaMismatch(_)));
    }

    #[test]
    fn compare_equal_schemas() {
        let types = FxHashMap::default();
        let config = EngineConfig::default();
        let a = Schema::from_config(users_ini(), "users-3", &types, &config).unwrap();
        let b = Schema::from_config(users_ini(), "users-3", &types, &config).unwrap();
        assert_eq!(a.compare(&b).unwrap(), CompareResult::Equal);
    }

    #[test]
    fn compare_differ_on_primary_key_change() {
        let types = FxHashMap::default();
        let config = EngineConfig::default();
        let a = Schema::from_config(users_ini(), "users-3", &types, &config).unwrap();
        let other_ini = users_ini().replace("primary_key=1", "primary_key=2");
        let b = Schema::from_config(&other_ini, "users-3", &types, &config).unwrap();
        assert_eq!(a.compare(&b).unwrap(), CompareResult::Differ);
    }

    #[test]
    fn compare_update_on_default_value_change() {
        let types = FxHashMap::default();
        let config = EngineConfig::default();
        let a = Schema::from_config(users_ini(), "users-3", &types, &config).unwrap();
        let other_ini = users_ini().replace(
            "[column::2]\nname=created\ntype=MSTIME\n",
            "[column::2]\nname=created\ntype=MSTIME\ndefault_value=0\n",
        );
        let b = Schema::from_config(&other_ini, "users-3", &types, &config).unwrap();
        assert_eq!(a.compare(&b).unwrap(), CompareResult::Update);
    }

    #[test]
    fn differing_index_sort_columns_is_differ() {
        let types = FxHashMap::default();
        let config = EngineConfig::default();
        let base = format!("{}\n[index::1]\nname=idx_date\ncolumns=2\n", users_ini());
        let extended = format!("{}\n[index::1]\nname=idx_date\ncolumns=2,1\n", users_ini());
        let a = Schema::from_config(&base, "users-3", &types, &config).unwrap();
        let b = Schema::from_config(&extended, "users-3", &types, &config).unwrap();
        assert_eq!(a.compare(&b).unwrap(), CompareResult::Differ);
    }
}
