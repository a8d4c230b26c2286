//! Tabular store: the three source tables plus the pre-joined view, loaded
//! once and shared read-only for the life of the process.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use thiserror::Error;

pub mod loader;
pub mod table;

pub use table::{JoinKind, JoinPlan, Scalar, Table, TableError};

pub const CLIENTS_STEM: &str = "Clients";
pub const INVOICES_STEM: &str = "Invoices";
pub const LINE_ITEMS_STEM: &str = "InvoiceLineItems";

const CLIENT_COLUMNS: &[&str] = &["client_id", "client_name", "industry", "country"];
const INVOICE_COLUMNS: &[&str] = &[
    "invoice_id",
    "client_id",
    "invoice_date",
    "due_date",
    "status",
    "currency",
    "fx_rate_to_usd",
];
const LINE_ITEM_COLUMNS: &[&str] = &[
    "line_id",
    "invoice_id",
    "service_name",
    "quantity",
    "unit_price",
    "tax_rate",
];
const DATE_COLUMNS: &[&str] = &["invoice_date", "due_date"];

#[derive(Debug, Error)]
pub enum DataError {
    #[error("data file not found: {} (a .csv with the same name is also accepted)", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read spreadsheet {}: {message}", path.display())]
    Excel { path: PathBuf, message: String },

    #[error("spreadsheet {} has no worksheets", path.display())]
    NoWorksheet { path: PathBuf },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}': cannot parse '{value}' in column '{column}' as a date")]
    InvalidTimestamp { table: String, column: String, value: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Name → table, in a stable order.
pub type Bindings = IndexMap<String, Arc<Table>>;

/// The canonical tax-inclusive amount of one line item.
pub fn line_total(quantity: f64, unit_price: f64, tax_rate: f64) -> f64 {
    quantity * unit_price * (1.0 + tax_rate)
}

#[derive(Debug, Clone)]
pub struct DataContext {
    pub clients: Arc<Table>,
    pub invoices: Arc<Table>,
    pub line_items: Arc<Table>,
    /// clients ⟕ invoices ⟕ line_items, plus `line_total`.
    pub merged: Arc<Table>,
}

impl DataContext {
    /// Validate, coerce date columns and build the joined view.
    pub fn from_tables(clients: Table, mut invoices: Table, line_items: Table) -> Result<Self, DataError> {
        require_columns("clients", &clients, CLIENT_COLUMNS)?;
        require_columns("invoices", &invoices, INVOICE_COLUMNS)?;
        require_columns("line_items", &line_items, LINE_ITEM_COLUMNS)?;

        for column in DATE_COLUMNS {
            loader::coerce_timestamps(&mut invoices, "invoices", column)?;
        }

        let merged = clients
            .join(&invoices, &["client_id".to_string()], JoinKind::Left)?
            .join(&line_items, &["invoice_id".to_string()], JoinKind::Left)?;
        let merged = with_line_total(merged)?;

        Ok(Self {
            clients: Arc::new(clients),
            invoices: Arc::new(invoices),
            line_items: Arc::new(line_items),
            merged: Arc::new(merged),
        })
    }

    /// Bindings exposed to generated programs.
    pub fn bindings(&self) -> Bindings {
        let mut b = IndexMap::new();
        b.insert("clients".to_string(), Arc::clone(&self.clients));
        b.insert("invoices".to_string(), Arc::clone(&self.invoices));
        b.insert("line_items".to_string(), Arc::clone(&self.line_items));
        b.insert("merged".to_string(), Arc::clone(&self.merged));
        b
    }
}

/// Load the three source files from `data_dir` and build the context.
pub fn load_data(data_dir: impl AsRef<Path>) -> Result<DataContext, DataError> {
    let dir = data_dir.as_ref();
    let clients = loader::read_table(dir, CLIENTS_STEM)?;
    let invoices = loader::read_table(dir, INVOICES_STEM)?;
    let line_items = loader::read_table(dir, LINE_ITEMS_STEM)?;
    let ctx = DataContext::from_tables(clients, invoices, line_items)?;
    tracing::info!(
        clients = ctx.clients.len(),
        invoices = ctx.invoices.len(),
        line_items = ctx.line_items.len(),
        merged = ctx.merged.len(),
        dir = %dir.display(),
        "data loaded"
    );
    Ok(ctx)
}

fn require_columns(name: &str, table: &Table, required: &[&str]) -> Result<(), DataError> {
    for column in required {
        if table.column_index(column).is_none() {
            return Err(DataError::MissingColumn {
                table: name.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn with_line_total(merged: Table) -> Result<Table, DataError> {
    let q = merged.require_column("quantity")?;
    let p = merged.require_column("unit_price")?;
    let t = merged.require_column("tax_rate")?;
    let totals = merged
        .rows()
        .iter()
        .map(|row| match (row[q].as_f64(), row[p].as_f64(), row[t].as_f64()) {
            (Some(q), Some(p), Some(t)) => Scalar::Float(line_total(q, p, t)),
            _ => Scalar::Null,
        })
        .collect();
    Ok(merged.with_column("line_total", totals))
}
