//! Integration coverage for schema parsing, comparison, and the sort-column
//! mini-grammar, built entirely through the crate's public API.

use rustc_hash::FxHashMap;
use tablecore::index::SortColumn;
use tablecore::schema::CompareResult;
use tablecore::{load_complex_types, CoreError, EngineConfig, Schema};

const USERS_INI: &str = "\
[table]
name=users
version=3
primary_key=1

[column::1]
name=name
type=P8STRING
flags=required

[column::2]
name=created
type=MSTIME
";

#[test]
fn scenario_load_users_schema() {
    let types = FxHashMap::default();
    let schema = Schema::from_config(USERS_INI, "users-3", &types, &EngineConfig::default()).unwrap();
    assert_eq!(schema.get_name(), "users");
    assert_eq!(schema.get_schema_version(), 3);
    assert_eq!(schema.get_primary_key(), &[1]);
    assert!(schema.get_column("_oid").is_some());
}

#[test]
fn scenario_expiration_date_must_be_time_type() {
    let ini = "[table]\nname=t\nversion=1\n\n[column::5]\nname=expiration_date\ntype=UINT32\n";
    let types = FxHashMap::default();
    let err = Schema::from_config(ini, "t-1", &types, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, CoreError::TypeMismatch { .. }));
}

#[test]
fn scenario_adding_trailing_sort_column_is_differ() {
    let types = FxHashMap::default();
    let config = EngineConfig::default();
    let base = format!("{USERS_INI}\n[index::1]\nname=idx_date\ncolumns=2\n");
    let extended = format!("{USERS_INI}\n[index::1]\nname=idx_date\ncolumns=2,1\n");
    let a = Schema::from_config(&base, "users-3", &types, &config).unwrap();
    let b = Schema::from_config(&extended, "users-3", &types, &config).unwrap();
    assert_eq!(a.compare(&b).unwrap(), CompareResult::Differ);
}

#[test]
fn scenario_index_spec_with_length_desc_nulls_last() {
    let sc = SortColumn::from_spec("1(32) desc nulls_last").unwrap();
    assert_eq!(sc.column_id, 1);
    assert_eq!(sc.length, 32);
    assert!(sc.flags.descending);
    assert!(sc.flags.place_nulls_last);
}

#[test]
fn scenario_nulls_last_and_without_nulls_conflict() {
    let err = SortColumn::from_spec("1 nulls_last without_nulls").unwrap_err();
    assert!(matches!(err, CoreError::ExclusiveFields(_)));
}

#[test]
fn reloading_the_same_definition_reproduces_an_equal_schema() {
    let types = FxHashMap::default();
    let config = EngineConfig::default();
    let a = Schema::from_config(USERS_INI, "users-3", &types, &config).unwrap();
    let b = Schema::from_config(USERS_INI, "users-3", &types, &config).unwrap();
    assert_eq!(a.compare(&b).unwrap(), CompareResult::Equal);
}

#[test]
fn scenario_complex_type_file_builds_a_record_referencing_another_record() {
    let ini = "\
[type::address]
fields=street P8STRING, zip UINT32

[type::contact]
fields=name P8STRING, home address
";
    let types = load_complex_types(ini).unwrap();
    assert_eq!(types.len(), 2);
    assert!(types.contains_key("address"));
    assert!(types.contains_key("contact"));

    let config = EngineConfig::default();
    let table_ini = "[table]\nname=customers\nversion=1\n\n[column::1]\nname=contact\ntype=contact\n";
    let schema = Schema::from_config(table_ini, "customers-1", &types, &config).unwrap();
    assert!(schema.get_column("contact").is_some());
}

#[test]
fn scenario_complex_type_enum_parses_with_default_underlying_type() {
    let ini = "[type::color]\nenum=red 0, green 1, blue 2\n";
    let types = load_complex_types(ini).unwrap();
    let color = types.get("color").unwrap();
    match &color.kind {
        tablecore::complextype::ComplexTypeKind::Enum { underlying, variants } => {
            assert_eq!(*underlying, tablecore::BasicType::UInt64);
            assert_eq!(variants.len(), 3);
        }
        _ => panic!("expected an enum complex type"),
    }
}

#[test]
fn scenario_complex_type_cannot_have_both_fields_and_enum() {
    let ini = "[type::bad]\nfields=a UINT32\nenum=x 0\n";
    let err = load_complex_types(ini).unwrap_err();
    assert!(matches!(err, CoreError::ExclusiveFields(_)));
}

#[test]
fn scenario_complex_type_referencing_unknown_type_is_rejected() {
    let ini = "[type::contact]\nfields=home address\n";
    let err = load_complex_types(ini).unwrap_err();
    assert!(matches!(err, CoreError::MissingParameter(_)));
}
