//! Grouping of consecutive statements into execution batches.
//!
//! A batch holds statements sharing one [`ExecutionMode`]. A new batch starts
//! when the mode changes, or when a statement names a descriptor set other
//! than the one the batch has adopted.

use keel_core::{ExecutionEnvironment, ExecutionMode, Statement, StatementType};

/// Consecutive statements executed together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    mode: ExecutionMode,
    statements: Vec<Statement>,
    descriptor_set: Option<String>,
    positions: Vec<usize>,
}

impl Batch {
    fn start(index: usize, statement: Statement) -> Self {
        let mut batch = Self {
            mode: statement.mode(),
            statements: Vec::new(),
            descriptor_set: None,
            positions: Vec::new(),
        };
        batch.push(index, statement);
        batch
    }

    fn accepts(&self, statement: &Statement) -> bool {
        if statement.mode() != self.mode {
            return false;
        }
        match statement.descriptor_set() {
            Some(name) => self.descriptor_set.as_deref() == Some(name),
            None => true,
        }
    }

    fn push(&mut self, index: usize, statement: Statement) {
        if let Some(name) = statement.descriptor_set() {
            self.descriptor_set = Some(name.to_string());
        }
        self.positions.push(index);
        self.statements.push(statement);
    }

    /// Execution mode shared by every statement
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Statements with their types resolved
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// SQL of every statement, in order
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.sql.clone()).collect()
    }

    /// Descriptor set adopted by this batch
    pub fn descriptor_set(&self) -> Option<&str> {
        self.descriptor_set.as_deref()
    }

    /// Position of the first statement in the migration's upgrade list
    pub fn first_index(&self) -> usize {
        self.positions.first().copied().unwrap_or_default()
    }

    /// Positions of every statement in the migration's upgrade list
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Always false for batches produced by [`Batcher`]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Incremental batch builder
#[derive(Debug, Default)]
pub struct Batcher {
    current: Option<Batch>,
}

impl Batcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the statement at `index`, returning the previous batch when the
    /// statement forces a boundary
    pub fn push(&mut self, index: usize, statement: &Statement) -> Option<Batch> {
        let mode = statement.mode();
        let statement = Statement {
            statement_type: StatementType::from(mode),
            ..statement.clone()
        };

        match self.current.as_mut() {
            Some(batch) if batch.accepts(&statement) => {
                batch.push(index, statement);
                None
            }
            _ => self.current.replace(Batch::start(index, statement)),
        }
    }

    /// Remaining batch, if any
    pub fn finish(self) -> Option<Batch> {
        self.current
    }
}

/// Batches for the statements that apply to `environment`
pub fn plan_batches(statements: &[Statement], environment: ExecutionEnvironment) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut batcher = Batcher::new();
    for (index, statement) in statements.iter().enumerate() {
        if !statement.env.applies_to(environment) {
            log::debug!("Skipping upgrade[{index}]: {} only", statement.env);
            continue;
        }
        batches.extend(batcher.push(index, statement));
    }
    batches.extend(batcher.finish());
    batches
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
