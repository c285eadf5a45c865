//! Human readable execution trace.

use crate::action::Action;
use crate::requirements::Requirements;
use crate::schema::TableSchema;

/// Accumulates the trace of one alteration run.
///
/// The output is deterministic for a given batch and table.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    out: String,
}

impl Trace {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            out: format!("ALTER TABLE {table:?}\n"),
        }
    }

    /// Appends a titled list of actions.
    pub fn actions<'a>(&mut self, title: &str, actions: impl IntoIterator<Item = &'a Action>) {
        let lines: Vec<String> = actions.into_iter().map(ToString::to_string).collect();
        self.out.push_str(&format!("{title} ({}):\n", lines.len()));
        for line in lines {
            self.out.push_str(&format!("  {line}\n"));
        }
    }

    pub fn requirements(&mut self, requirements: Requirements) {
        self.out.push_str(&format!(
            "Requirements: {requirements} ({})\n",
            requirements.strategy()
        ));
    }

    /// Appends the definition the table will have after the alteration.
    pub fn target(&mut self, table: &TableSchema) {
        self.out.push_str(&format!(
            "Target table {:?} ({} fields):\n",
            table.name,
            table.fields.len()
        ));
        for (position, field) in table.fields.iter().enumerate() {
            self.out.push_str(&format!("  {position}: {field}\n"));
        }
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}
