//! Alterations against a real SQLite database.

use oxide_alter::SqliteCatalog;
use oxide_alter_core::prelude::*;

fn persons() -> SqliteCatalog {
    let mut catalog = SqliteCatalog::open_in_memory()
        .unwrap_or_else(|e| panic!("Failed to open database: {e}"));
    catalog
        .execute_sql(
            "CREATE TABLE persons (id INTEGER PRIMARY KEY, name VARCHAR, age VARCHAR, city VARCHAR)",
        )
        .unwrap_or_else(|e| panic!("Failed to create table: {e}"));
    catalog
        .execute_sql(
            "INSERT INTO persons VALUES \
             (1, 'Ada', '36', 'London'), \
             (2, 'Grace', '85', 'New York'), \
             (3, 'Linus', 'unknown', 'Helsinki')",
        )
        .unwrap_or_else(|e| panic!("Failed to insert rows: {e}"));
    catalog
}

fn run(catalog: &mut SqliteCatalog, table: &str, actions: Vec<Action>) -> AlterReport {
    run_with(catalog, table, actions, &AlterOptions::new())
}

fn run_with(
    catalog: &mut SqliteCatalog,
    table: &str,
    actions: Vec<Action>,
    options: &AlterOptions,
) -> AlterReport {
    let mut handler = AlterTableHandler::new();
    for action in actions {
        handler.add_action(action);
    }
    handler.execute(catalog, table, options)
}

fn field(table: &TableSchema, name: &str) -> FieldSchema {
    table
        .get_field(name)
        .cloned()
        .unwrap_or_else(|| panic!("Expected field {name} in {}", table.name))
}

fn names(catalog: &mut SqliteCatalog, table: &str) -> Vec<String> {
    catalog
        .table_schema(table)
        .unwrap()
        .field_names()
        .map(str::to_string)
        .collect()
}

fn texts(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

#[test]
fn test_introspects_foreign_table() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    catalog
        .execute_sql(
            "CREATE TABLE t (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             code VARCHAR(8) NOT NULL UNIQUE, \
             score REAL DEFAULT 1.5, \
             tag TEXT)",
        )
        .unwrap();
    catalog.execute_sql("CREATE INDEX t_tag ON t (tag)").unwrap();

    let table = catalog.table_schema("t").unwrap();
    table.validate().unwrap();

    let id = field(&table, "id");
    assert!(id.primary_key && id.auto_increment);
    assert_eq!(id.field_type, FieldType::Integer);

    let code = field(&table, "code");
    assert_eq!((code.field_type, code.max_length), (FieldType::Text, 8));
    assert!(code.not_null && code.unique && !code.indexed);

    let score = field(&table, "score");
    assert_eq!(score.field_type, FieldType::Double);
    assert_eq!(score.default_value, Value::Float(1.5));

    let tag = field(&table, "tag");
    assert_eq!(tag.field_type, FieldType::LongText);
    assert!(tag.indexed && !tag.unique);
}

#[test]
fn test_caption_change_writes_catalog_only() {
    let mut catalog = persons();
    let table = catalog.table_schema("persons").unwrap();

    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(&field(&table, "name"), "caption", "Name")],
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.requirements, Requirements::MAIN_CATALOG_UPDATE);
    assert!(report.new_table.is_none());

    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "name").caption, "Name");
    assert_eq!(field(&stored, "name").uid, field(&table, "name").uid);
    assert_eq!(
        catalog.column("persons", "name").unwrap(),
        texts(&["Ada", "Grace", "Linus"])
    );
}

#[test]
fn test_type_change_recreates_table() {
    let mut catalog = persons();
    let table = catalog.table_schema("persons").unwrap();

    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(&field(&table, "age"), "type", "Integer")],
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(report.rows_copied, 3);
    assert_eq!(report.conversion_failures, 1);
    assert_eq!(catalog.table_names().unwrap(), vec!["persons"]);

    let stored = catalog.table_schema("persons").unwrap();
    assert_eq!(field(&stored, "age").field_type, FieldType::Integer);
    assert_eq!(field(&stored, "age").uid, field(&table, "age").uid);
    assert_eq!(
        catalog.column("persons", "age").unwrap(),
        vec![Value::Integer(36), Value::Integer(85), Value::Integer(0)]
    );
}

#[test]
fn test_remove_and_insert_same_name() {
    let mut catalog = persons();
    let table = catalog.table_schema("persons").unwrap();
    let new_city =
        FieldSchema::new("city", FieldType::Text).with_uid(catalog.next_field_uid().unwrap());

    let report = run(
        &mut catalog,
        "persons",
        vec![
            Action::remove_field(&field(&table, "city")),
            Action::insert_field(2, new_city),
        ],
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(names(&mut catalog, "persons"), vec!["id", "name", "city", "age"]);
    assert_eq!(
        catalog.column("persons", "city").unwrap(),
        vec![Value::Null, Value::Null, Value::Null]
    );
    assert_eq!(
        catalog.column("persons", "age").unwrap(),
        texts(&["36", "85", "unknown"])
    );
}

#[test]
fn test_unique_violation_rolls_back() {
    let mut catalog = persons();
    catalog
        .execute_sql("INSERT INTO persons VALUES (4, 'Ada', '20', 'Paris')")
        .unwrap();
    let table = catalog.table_schema("persons").unwrap();

    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(&field(&table, "name"), "unique", true)],
    );

    let Outcome::Failed(message) = &report.outcome else {
        panic!("Expected failure, got {}", report.outcome);
    };
    assert!(message.contains("UNIQUE constraint failed"), "{message}");
    assert_eq!(catalog.table_names().unwrap(), vec!["persons"]);
    assert_eq!(catalog.table_schema("persons").unwrap(), table);
    assert_eq!(catalog.rows("persons").unwrap().len(), 4);
}

#[test]
fn test_simulate_leaves_database_alone() {
    let mut catalog = persons();
    let table = catalog.table_schema("persons").unwrap();

    let report = run_with(
        &mut catalog,
        "persons",
        vec![
            Action::change_property(&field(&table, "age"), "type", "Integer"),
            Action::remove_field(&field(&table, "city")),
        ],
        &AlterOptions::new().simulate(true),
    );

    assert!(report.outcome.is_success(), "{}", report.outcome);
    let target = report.new_table.unwrap();
    assert_eq!(target.field_names().collect::<Vec<_>>(), vec!["id", "name", "age"]);
    assert_eq!(catalog.table_schema("persons").unwrap(), table);
    assert_eq!(
        catalog.column("persons", "age").unwrap(),
        texts(&["36", "85", "unknown"])
    );
}

#[test]
fn test_auto_increment_survives_recreation() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let mut schema = TableSchema::new("notes")
        .field(
            FieldSchema::new("id", FieldType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .field(FieldSchema::new("body", FieldType::Text));
    for f in &mut schema.fields {
        f.uid = catalog.next_field_uid().unwrap();
    }
    catalog.create_physical_table(&schema).unwrap();
    catalog
        .insert_row("notes", vec![Value::Null, "first".into()])
        .unwrap();
    catalog
        .insert_row("notes", vec![Value::Null, "second".into()])
        .unwrap();

    let table = catalog.table_schema("notes").unwrap();
    let report = run(
        &mut catalog,
        "notes",
        vec![Action::change_property(&field(&table, "body"), "type", "LongText")],
    );
    assert!(report.outcome.is_success(), "{}", report.outcome);

    catalog
        .insert_row("notes", vec![Value::Null, "third".into()])
        .unwrap();
    assert_eq!(
        catalog.column("notes", "id").unwrap(),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    assert!(field(&catalog.table_schema("notes").unwrap(), "id").auto_increment);
}

#[test]
fn test_indexes_follow_consecutive_recreations() {
    let mut catalog = persons();
    let table = catalog.table_schema("persons").unwrap();
    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(&field(&table, "city"), "indexed", true)],
    );
    assert!(report.outcome.is_success(), "{}", report.outcome);

    let table = catalog.table_schema("persons").unwrap();
    let report = run(
        &mut catalog,
        "persons",
        vec![Action::change_property(&field(&table, "age"), "type", "Integer")],
    );
    assert!(report.outcome.is_success(), "{}", report.outcome);

    let stored = catalog.table_schema("persons").unwrap();
    assert!(field(&stored, "city").indexed);
    catalog
        .execute_sql(r#"DROP INDEX "persons__city__idx""#)
        .unwrap_or_else(|e| panic!("Index was not renamed: {e}"));
}

#[test]
fn test_metadata_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("alter.db").display());

    {
        let mut catalog = SqliteCatalog::connect(&url).unwrap();
        catalog
            .execute_sql("CREATE TABLE cities (id INTEGER PRIMARY KEY, name VARCHAR(40))")
            .unwrap();
        let table = catalog.table_schema("cities").unwrap();
        let name = field(&table, "name");
        let report = run(
            &mut catalog,
            "cities",
            vec![
                Action::change_property(&name, "caption", "City"),
                Action::change_property(&name, "rowSource", "countries"),
                Action::change_property(&name, "type", "LongText"),
            ],
        );
        assert!(report.outcome.is_success(), "{}", report.outcome);
    }

    let mut catalog = SqliteCatalog::connect(&url).unwrap();
    let table = catalog.table_schema("cities").unwrap();
    let name = field(&table, "name");
    assert_eq!(name.caption, "City");
    assert_eq!(name.extended.lookup.row_source, "countries");
    assert_eq!(name.field_type, FieldType::LongText);
}

#[test]
fn test_script_resolves_names() {
    let mut catalog = persons();
    let script = AlterScript::from_json(
        r#"{
            "actions": [
                { "action": "change_property", "field": "city", "property": "name", "value": "town" },
                { "action": "move_field", "field": "town", "position": 1 },
                { "action": "insert_field", "position": 4,
                  "field": { "name": "country", "field_type": "Text", "default_value": "UK" } }
            ]
        }"#,
    )
    .unwrap();

    let table = catalog.table_schema("persons").unwrap();
    let batch = script.resolve(&table, &mut catalog).unwrap();
    let report =
        AlterTableHandler::with_batch(batch).execute(&mut catalog, "persons", &script.options);

    assert!(report.outcome.is_success(), "{}", report.outcome);
    assert_eq!(
        names(&mut catalog, "persons"),
        vec!["id", "town", "name", "age", "country"]
    );
    assert_eq!(
        catalog.column("persons", "town").unwrap(),
        texts(&["London", "New York", "Helsinki"])
    );
    assert_eq!(
        catalog.column("persons", "country").unwrap(),
        texts(&["UK", "UK", "UK"])
    );
}
