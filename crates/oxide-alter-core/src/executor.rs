//! Alteration executor.
//!
//! [`AlterTableHandler`] collects actions and applies them to one table. A
//! run walks a small state machine:
//!
//! ```text
//! Idle -> RequirementsKnown -> { NoOp | MetadataUpdate | PhysicalRecreate }
//!      -> Committed | Failed | Cancelled
//! ```
//!
//! Metadata-only batches are written to the catalog in one transaction.
//! Anything else recreates the table: a shadow table with the target
//! definition is created, rows are copied, the original is dropped and the
//! shadow renamed, all inside one transaction.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionBatch};
use crate::catalog::{ConversionPlan, SchemaCatalog, Transaction};
use crate::error::{AlterError, Outcome, Result};
use crate::requirements::{AlterStrategy, Requirements};
use crate::schema::TableSchema;
use crate::simplify::{simplify, Simplified};
use crate::trace::Trace;

/// Suffix of the shadow table used while recreating a table.
pub const TEMPORARY_SUFFIX: &str = "__altered";

/// State of an [`AlterTableHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    RequirementsKnown,
    MetadataUpdate,
    PhysicalRecreate,
    NoOp,
    Committed,
    Failed,
    Cancelled,
}

/// Shared flag for cooperative cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Observed at the next action or physical step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for [`AlterTableHandler::execute`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlterOptions {
    /// Plan and trace, but do not write anything.
    pub simulate: bool,
    /// Stop once the requirements are known.
    pub only_compute_requirements: bool,
    #[serde(skip)]
    pub cancel_token: Option<CancelToken>,
}

impl AlterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    #[must_use]
    pub const fn only_compute_requirements(mut self, only: bool) -> Self {
        self.only_compute_requirements = only;
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        match &self.cancel_token {
            Some(token) if token.is_cancelled() => Err(AlterError::Cancelled(stage.to_string())),
            _ => Ok(()),
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct AlterReport {
    pub outcome: Outcome,
    pub requirements: Requirements,
    /// The table definition after the alteration: set on the physical path
    /// (including simulations), `None` otherwise.
    pub new_table: Option<TableSchema>,
    pub rows_copied: u64,
    pub conversion_failures: u64,
    /// Actions ignored because their property is unknown.
    pub skipped: Vec<Action>,
    pub trace: String,
}

impl AlterReport {
    const fn new() -> Self {
        Self {
            outcome: Outcome::Success,
            requirements: Requirements::empty(),
            new_table: None,
            rows_copied: 0,
            conversion_failures: 0,
            skipped: Vec::new(),
            trace: String::new(),
        }
    }
}

/// Collects actions for one table and applies them.
#[derive(Debug)]
pub struct AlterTableHandler {
    batch: ActionBatch,
    state: ExecutionState,
}

impl Default for AlterTableHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlterTableHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batch: ActionBatch::new(),
            state: ExecutionState::Idle,
        }
    }

    /// Creates a handler with a prepared batch.
    #[must_use]
    pub const fn with_batch(batch: ActionBatch) -> Self {
        Self {
            batch,
            state: ExecutionState::Idle,
        }
    }

    /// Queues an action; returns its order in the batch.
    pub fn add_action(&mut self, action: Action) -> usize {
        self.batch.push(action)
    }

    /// Drops every queued action.
    pub fn clear(&mut self) {
        self.batch.clear();
        self.state = ExecutionState::Idle;
    }

    #[must_use]
    pub const fn actions(&self) -> &ActionBatch {
        &self.batch
    }

    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    fn transition(&mut self, next: ExecutionState) {
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    /// Applies the queued actions to `table_name`. The queue is consumed.
    ///
    /// Never panics for expected failures: errors and cancellations are
    /// reported through [`AlterReport::outcome`].
    pub fn execute<C: SchemaCatalog + ?Sized>(
        &mut self,
        catalog: &mut C,
        table_name: &str,
        options: &AlterOptions,
    ) -> AlterReport {
        let batch = mem::take(&mut self.batch);
        self.state = ExecutionState::Idle;
        info!(
            table = %table_name,
            actions = batch.len(),
            simulate = options.simulate,
            "Altering table"
        );

        let mut report = AlterReport::new();
        let mut trace = Trace::new(table_name);
        let result = self.run(catalog, table_name, batch, options, &mut report, &mut trace);

        match &result {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {
                self.transition(ExecutionState::Cancelled);
                warn!(table = %table_name, stage = %err, "Table alteration cancelled");
            }
            Err(err) => {
                self.transition(ExecutionState::Failed);
                warn!(table = %table_name, error = %err, "Table alteration failed");
            }
        }
        report.outcome = Outcome::from(result);
        trace.line(format!("Outcome: {}", report.outcome));
        report.trace = trace.finish();

        info!(
            table = %table_name,
            outcome = %report.outcome,
            state = ?self.state,
            "Table alteration finished"
        );
        report
    }

    fn run<C: SchemaCatalog + ?Sized>(
        &mut self,
        catalog: &mut C,
        table_name: &str,
        batch: ActionBatch,
        options: &AlterOptions,
        report: &mut AlterReport,
        trace: &mut Trace,
    ) -> Result<()> {
        trace.actions("Actions before simplification", &batch);
        let table = catalog.table_schema(table_name)?;
        let simplified = simplify(batch, &table)?;

        if !simplified.skipped.is_empty() {
            trace.actions("Skipped actions", &simplified.skipped);
        }
        trace.actions("Actions after simplification", &simplified.batch);
        trace.requirements(simplified.requirements);
        report.requirements = simplified.requirements;
        report.skipped = simplified.skipped.clone();
        self.transition(ExecutionState::RequirementsKnown);

        if options.only_compute_requirements {
            return Ok(());
        }

        let strategy = simplified.requirements.strategy();
        info!(table = %table_name, strategy = %strategy, "Applying alteration");
        match strategy {
            AlterStrategy::NoOp => {
                self.transition(ExecutionState::NoOp);
                Ok(())
            }
            AlterStrategy::MetadataUpdate => {
                self.transition(ExecutionState::MetadataUpdate);
                update_metadata(catalog, table, &simplified, options, trace)?;
                if !options.simulate {
                    self.transition(ExecutionState::Committed);
                }
                Ok(())
            }
            AlterStrategy::PhysicalRecreate => {
                self.transition(ExecutionState::PhysicalRecreate);
                recreate(catalog, &table, &simplified, options, report, trace)?;
                if !options.simulate {
                    self.transition(ExecutionState::Committed);
                }
                Ok(())
            }
        }
    }
}

fn update_metadata<C: SchemaCatalog + ?Sized>(
    catalog: &mut C,
    mut table: TableSchema,
    simplified: &Simplified,
    options: &AlterOptions,
    trace: &mut Trace,
) -> Result<()> {
    if options.simulate {
        for action in &simplified.batch {
            options.check_cancelled("update metadata")?;
            action.apply_to_schema(&mut table)?;
        }
        trace.line("Simulation: catalog not updated");
        return Ok(());
    }

    let mut tx = Transaction::begin(catalog)?;
    for action in &simplified.batch {
        options.check_cancelled("update metadata")?;
        action.apply_to_catalog(&mut table, &mut *tx)?;
    }
    tx.commit()?;
    trace.line(format!(
        "Catalog updated ({} actions)",
        simplified.batch.len()
    ));
    Ok(())
}

fn recreate<C: SchemaCatalog + ?Sized>(
    catalog: &mut C,
    source: &TableSchema,
    simplified: &Simplified,
    options: &AlterOptions,
    report: &mut AlterReport,
    trace: &mut Trace,
) -> Result<()> {
    let mut target = source.clone();
    for action in &simplified.batch {
        options.check_cancelled("apply action")?;
        action.apply_to_schema(&mut target)?;
    }
    target.validate()?;
    trace.target(&target);

    if options.simulate {
        trace.line("Simulation: physical operations skipped");
        report.new_table = Some(target);
        return Ok(());
    }

    let plan = ConversionPlan::new(source, &target, &simplified.data_conversion_uids());
    let mut tx = Transaction::begin(catalog)?;

    let temporary = temporary_table_name(&mut *tx, &source.name)?;
    let mut shadow = target.clone();
    shadow.name = temporary.clone();

    options.check_cancelled("create temporary table")?;
    debug!(table = %temporary, "Creating temporary table");
    tx.create_physical_table(&shadow)?;

    options.check_cancelled("copy rows")?;
    let stats = tx.copy_rows(&source.name, &temporary, &plan)?;

    options.check_cancelled("drop original table")?;
    tx.drop_table(&source.name)?;

    options.check_cancelled("rename temporary table")?;
    tx.rename_table(&temporary, &source.name)?;

    tx.commit()?;

    if stats.rows_with_conversion_failure > 0 {
        warn!(
            table = %source.name,
            rows = stats.rows_with_conversion_failure,
            "Rows with values that could not be converted"
        );
    }
    trace.line(format!(
        "Recreated via {:?}: {} rows copied, {} with conversion failures",
        temporary, stats.rows_copied, stats.rows_with_conversion_failure
    ));
    report.rows_copied = stats.rows_copied;
    report.conversion_failures = stats.rows_with_conversion_failure;
    report.new_table = Some(target);
    Ok(())
}

/// Picks a free name for the shadow table of `table`.
///
/// # Errors
///
/// Passes through the catalog's error.
pub fn temporary_table_name<C: SchemaCatalog + ?Sized>(
    catalog: &mut C,
    table: &str,
) -> Result<String> {
    let base = format!("{table}{TEMPORARY_SUFFIX}");
    if !catalog.table_exists(&base)? {
        return Ok(base);
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{base}_{counter}");
        if !catalog.table_exists(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}
