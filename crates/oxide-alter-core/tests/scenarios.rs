//! End-to-end alteration scenarios against the in-memory catalog.

mod common;

use common::{field, field_names, persons, run, texts};
use oxide_alter_core::prelude::*;

#[test]
fn test_caption_change_is_metadata_only() {
    let mut catalog = MemoryCatalog::new();
    let table = catalog
        .create_table(
            TableSchema::new("t")
                .field(FieldSchema::new("id", FieldType::Integer).primary_key())
                .field(FieldSchema::new("name", FieldType::Text)),
        )
        .unwrap();

    let report = run(
        &mut catalog,
        "t",
        vec![Action::change_property(field(&table, "name"), "caption", "Name")],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.requirements, Requirements::MAIN_CATALOG_UPDATE);
    assert!(report.new_table.is_none());
    assert!(!catalog.calls().iter().any(|op| op.is_physical()));
    assert!(catalog.called(CatalogOperation::StoreFieldMetadata));
    assert!(catalog.called(CatalogOperation::Commit));

    let stored = catalog.table_schema("t").unwrap();
    assert_eq!(field(&stored, "name").caption, "Name");
}

#[test]
fn test_extended_properties_are_metadata_only() {
    let (mut catalog, table) = persons();
    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::change_property(field(&table, "city"), "rowSource", "cities"),
            Action::change_property(field(&table, "city"), "boundColumn", 1),
            Action::change_property(field(&table, "age"), "visibleDecimalPlaces", 2),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.requirements, Requirements::EXTENDED_CATALOG_UPDATE);
    assert!(!catalog.calls().iter().any(|op| op.is_physical()));

    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "city").extended.lookup.row_source, "cities");
    assert_eq!(field(&stored, "city").extended.lookup.bound_column, 1);
    assert_eq!(field(&stored, "age").extended.visible_decimal_places, 2);
}

#[test]
fn test_type_change_preserves_strings() {
    let (mut catalog, table) = persons();
    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(field(&table, "name"), "type", "LongText")],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert!(report
        .requirements
        .contains(Requirements::PHYSICAL_ALTERATION | Requirements::DATA_CONVERSION));
    assert_eq!(report.rows_copied, 3);
    assert_eq!(report.conversion_failures, 0);

    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "name").field_type, FieldType::LongText);
    assert_eq!(
        catalog.column("persons", "name").unwrap(),
        texts(&["Ada", "Grace", "Linus"])
    );
    assert_eq!(catalog.table_names(), vec!["persons"]);
    assert_eq!(report.new_table.unwrap(), stored);
}

#[test]
fn test_remove_and_insert_same_name_gives_fresh_column() {
    let (mut catalog, table) = persons();
    let new_city = FieldSchema::new("city", FieldType::Text)
        .with_uid(catalog.next_field_uid().unwrap());

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::remove_field(field(&table, "city")),
            Action::insert_field(2, new_city.clone()),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["id", "name", "city", "age"]
    );
    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "city").uid, new_city.uid);
    assert_eq!(
        catalog.column("persons", "city").unwrap(),
        vec![Value::Null, Value::Null, Value::Null]
    );
}

#[test]
fn test_conversion_failures_are_counted() {
    let mut catalog = MemoryCatalog::new();
    let table = catalog
        .create_table(
            TableSchema::new("measurements")
                .field(FieldSchema::new("id", FieldType::Integer).primary_key())
                .field(FieldSchema::new("reading", FieldType::Text)),
        )
        .unwrap();
    let readings = ["1", "2", "n/a", "4", "5", "6", "broken", "8", "9", "10"];
    for (id, reading) in (1..).zip(readings) {
        catalog
            .insert_row("measurements", vec![Value::Integer(id), reading.into()])
            .unwrap();
    }

    let report = run(
        &mut catalog,
        "measurements",
        vec![Action::change_property(field(&table, "reading"), "type", "Integer")],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.rows_copied, 10);
    assert_eq!(report.conversion_failures, 2);
    let expected: Vec<Value> = [1, 2, 0, 4, 5, 6, 0, 8, 9, 10]
        .into_iter()
        .map(Value::Integer)
        .collect();
    assert_eq!(catalog.column("measurements", "reading").unwrap(), expected);
}

#[test]
fn test_default_value_is_used_for_failed_conversions() {
    let (mut catalog, table) = persons();
    let age = field(&table, "age");
    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::change_property(age, "type", "Integer"),
            Action::change_property(age, "defaultValue", -1),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.conversion_failures, 1);
    assert_eq!(
        catalog.column("persons", "age").unwrap(),
        vec![Value::Integer(36), Value::Integer(85), Value::Integer(-1)]
    );
}

#[test]
fn test_swapping_names_keeps_data_with_uid() {
    let (mut catalog, table) = persons();
    let name = field(&table, "name");
    let city = field(&table, "city");

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::change_property(name, "name", "city"),
            Action::change_property(city, "name", "name"),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        catalog.column("persons", "city").unwrap(),
        texts(&["Ada", "Grace", "Linus"])
    );
    assert_eq!(
        catalog.column("persons", "name").unwrap(),
        texts(&["London", "New York", "Helsinki"])
    );
    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "city").uid, name.uid);
}

#[test]
fn test_move_and_rename_in_one_batch() {
    let (mut catalog, table) = persons();
    let city = field(&table, "city");

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::move_field(city, 1),
            Action::change_property(city, "name", "town"),
            Action::change_property(city, "caption", "Town"),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["id", "town", "name", "age"]
    );
    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "town").caption, "Town");
    assert_eq!(
        catalog.column("persons", "town").unwrap(),
        texts(&["London", "New York", "Helsinki"])
    );
}

#[test]
fn test_duplicate_name_fails_before_touching_catalog() {
    let (mut catalog, table) = persons();
    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(field(&table, "city"), "name", "name")],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_failed());
    assert!(!catalog.called(CatalogOperation::BeginTransaction));
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["id", "name", "age", "city"]
    );
}

#[test]
fn test_trace_lists_actions_before_and_after() {
    let (mut catalog, table) = persons();
    let name = field(&table, "name");
    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::change_property(name, "caption", "A"),
            Action::change_property(name, "colour", "red"),
            Action::change_property(name, "caption", "B"),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.skipped.len(), 1);
    let expected = "\
ALTER TABLE \"persons\"
Actions before simplification (3):
  [0] ChangeProperty field=\"name\" uid=2 caption=\"A\" requires={MainCatalogUpdate}
  [1] ChangeProperty field=\"name\" uid=2 colour=\"red\" requires={}
  [2] ChangeProperty field=\"name\" uid=2 caption=\"B\" requires={MainCatalogUpdate}
Skipped actions (1):
  [1] ChangeProperty field=\"name\" uid=2 colour=\"red\" requires={}
Actions after simplification (1):
  [2] ChangeProperty field=\"name\" uid=2 caption=\"B\" requires={MainCatalogUpdate}
Requirements: {MainCatalogUpdate} (metadata update)
Catalog updated (1 actions)
Outcome: success
";
    assert_eq!(report.trace, expected);
}

#[test]
fn test_move_of_inserted_field_after_other_removal() {
    let (mut catalog, table) = persons();
    let extra = FieldSchema::new("extra", FieldType::Text)
        .with_uid(catalog.next_field_uid().unwrap());

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::insert_field(4, extra.clone()),
            Action::remove_field(field(&table, "name")),
            Action::move_field(&extra, 3),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["id", "age", "city", "extra"]
    );
    assert_eq!(
        catalog.column("persons", "city").unwrap(),
        texts(&["London", "New York", "Helsinki"])
    );
}

#[test]
fn test_move_of_inserted_field_to_end_after_second_insert() {
    let (mut catalog, _) = persons();
    let first = FieldSchema::new("first", FieldType::Text)
        .with_uid(catalog.next_field_uid().unwrap());
    let second = FieldSchema::new("second", FieldType::Text)
        .with_uid(catalog.next_field_uid().unwrap());

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::insert_field(0, first.clone()),
            Action::insert_field(5, second),
            Action::move_field(&first, 5),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["id", "name", "age", "city", "second", "first"]
    );
}

#[test]
fn test_earlier_move_pins_insert_position() {
    let (mut catalog, table) = persons();
    let city = field(&table, "city");
    let extra = FieldSchema::new("extra", FieldType::Text)
        .with_uid(catalog.next_field_uid().unwrap());

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::move_field(city, 0),
            Action::insert_field(1, extra),
            Action::move_field(city, 4),
        ],
        &AlterOptions::new(),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        field_names(&mut catalog, "persons"),
        vec!["extra", "id", "name", "age", "city"]
    );
}
