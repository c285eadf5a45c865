#![allow(dead_code)]

use oxide_alter_core::prelude::*;

/// `persons(id: Integer PK, name: Text, age: Text, city: Text)` with three rows.
pub fn persons() -> (MemoryCatalog, TableSchema) {
    let mut catalog = MemoryCatalog::new();
    let table = catalog
        .create_table(
            TableSchema::new("persons")
                .field(FieldSchema::new("id", FieldType::Integer).primary_key())
                .field(FieldSchema::new("name", FieldType::Text))
                .field(FieldSchema::new("age", FieldType::Text))
                .field(FieldSchema::new("city", FieldType::Text)),
        )
        .unwrap_or_else(|e| panic!("Failed to create table: {e}"));
    let rows = [
        (1, "Ada", "36", "London"),
        (2, "Grace", "85", "New York"),
        (3, "Linus", "unknown", "Helsinki"),
    ];
    for (id, name, age, city) in rows {
        catalog
            .insert_row(
                "persons",
                vec![Value::Integer(id), name.into(), age.into(), city.into()],
            )
            .unwrap_or_else(|e| panic!("Failed to insert row: {e}"));
    }
    catalog.clear_calls();
    (catalog, table)
}

pub fn field<'a>(table: &'a TableSchema, name: &str) -> &'a FieldSchema {
    table
        .get_field(name)
        .unwrap_or_else(|| panic!("Expected field {name} in {}", table.name))
}

/// Runs `actions` against `table_name` and returns the report.
pub fn run(
    catalog: &mut MemoryCatalog,
    table_name: &str,
    actions: Vec<Action>,
    options: &AlterOptions,
) -> AlterReport {
    let mut handler = AlterTableHandler::new();
    for action in actions {
        handler.add_action(action);
    }
    handler.execute(catalog, table_name, options)
}

/// Names of the stored fields of `table`, in order.
pub fn field_names(catalog: &mut MemoryCatalog, table: &str) -> Vec<String> {
    catalog
        .table_schema(table)
        .unwrap_or_else(|e| panic!("Failed to load {table}: {e}"))
        .fields
        .into_iter()
        .map(|f| f.name)
        .collect()
}

pub fn texts(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}
