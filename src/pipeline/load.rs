use csv::StringRecord;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::constants::PROCESSED_SUFFIX;
use crate::dataset::table_name_for;
use crate::db::{open_database, quote_ident};
use crate::error::{EtlError, Result};
use crate::pipeline::tsv::{self, file_name_of};

/// Declared SQLite type of a loaded column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Narrowest type that still fits `value` after having fit everything before it
    fn widen(self, value: &str) -> Self {
        match self {
            ColumnType::Integer if value.parse::<i64>().is_ok() => ColumnType::Integer,
            ColumnType::Integer | ColumnType::Real if value.parse::<f64>().is_ok() => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }

    fn to_value(self, field: &str) -> Value {
        if field.is_empty() {
            return Value::Null;
        }
        match self {
            ColumnType::Integer => field
                .parse()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(field.to_string())),
            ColumnType::Real => field
                .parse()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(field.to_string())),
            ColumnType::Text => Value::Text(field.to_string()),
        }
    }
}

/// The TSV writer emits an empty single-field row as `""` so the line is not
/// blank; in a one-column file that cell is the empty value.
fn cell<'a>(field: &'a str, width: usize) -> &'a str {
    if width == 1 && field == EMPTY_SINGLE_FIELD {
        ""
    } else {
        field
    }
}

const EMPTY_SINGLE_FIELD: &str = "\"\"";

#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub file: String,
    pub table: String,
    pub rows: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub tables: Vec<LoadedTable>,
}

/// Load every normalized TSV in the processed directory, one full-replace table per file.
#[instrument(skip_all, fields(database = %config.storage.database.display()))]
pub fn load_processed(config: &Config) -> Result<LoadReport> {
    let files = tsv::list_files_with_suffix(&config.storage.processed_dir, PROCESSED_SUFFIX)?;
    let mut conn = open_database(&config.storage.database)?;

    let mut report = LoadReport::default();
    for path in files {
        let file = file_name_of(&path);
        let table = table_name_for(&file);
        let rows = load_table(&mut conn, &path, &table)?;
        info!("{} saved as table {} ({} rows)", file, table, rows);
        crate::metrics::load::table_loaded(&table, rows);

        if config.storage.cleanup_consumed {
            fs::remove_file(&path)?;
        }
        report.tables.push(LoadedTable { file, table, rows });
    }

    info!("{} table(s) written to the database", report.tables.len());
    Ok(report)
}

/// Replace `table` with the content of the TSV at `path` in a single transaction.
pub fn load_table(conn: &mut Connection, path: &Path, table: &str) -> Result<u64> {
    let file = file_name_of(path);
    let columns = infer_columns(path)?;
    debug!(
        "Inferred columns for {}: {}",
        table,
        columns
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty.sql()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let column_defs = columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({column_defs});",
        table = quote_ident(table),
        column_defs = column_defs
    ))?;

    let mut rows = 0u64;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(table),
            placeholders
        ))?;
        let mut reader = open_reader(path)?;
        let mut record = StringRecord::new();
        let mut values: Vec<Value> = Vec::with_capacity(columns.len());
        while reader
            .read_record(&mut record)
            .map_err(|e| EtlError::tsv(&file, e))?
        {
            values.clear();
            values.extend(
                record
                    .iter()
                    .zip(&columns)
                    .map(|(field, (_, ty))| ty.to_value(cell(field, columns.len()))),
            );
            stmt.execute(params_from_iter(values.iter()))?;
            rows += 1;
        }
    }
    tx.commit()?;
    Ok(rows)
}

/// Header names paired with the narrowest type fitting every non-empty value.
pub fn infer_columns(path: &Path) -> Result<Vec<(String, ColumnType)>> {
    let file = file_name_of(path);
    let mut reader = open_reader(path)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::tsv(&file, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(EtlError::MissingHeader(file));
    }

    let mut types = vec![ColumnType::Integer; headers.len()];
    let mut seen = vec![false; headers.len()];
    let mut record = StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|e| EtlError::tsv(&file, e))?
    {
        for (i, field) in record.iter().enumerate() {
            let field = cell(field, headers.len());
            if field.is_empty() {
                continue;
            }
            seen[i] = true;
            types[i] = types[i].widen(field);
        }
    }

    Ok(headers
        .into_iter()
        .zip(types.into_iter().zip(seen))
        .map(|(name, (ty, seen))| (name, if seen { ty } else { ColumnType::Text }))
        .collect())
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    tsv::reader_builder()
        .from_path(path)
        .map_err(|e| EtlError::tsv(file_name_of(path), e))
}
