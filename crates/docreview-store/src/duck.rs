//! DuckDB store for extraction results and verification records.

use std::path::{Path, PathBuf};

use arrow::array::Int64Array;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use docreview_core::{CountSpec, DocumentRecord, Expr, FieldDefinition, ReviewConfig};
use duckdb::types::Value;
use duckdb::{Connection, params, params_from_iter};
use tracing::{debug, info, warn};

use crate::sql::{self, SqlFragment, SqlParam, Tables};
use crate::{DocumentStore, InsertOutcome, Relation, StoreError, decode_documents, resolve_blob_path};

/// DuckDB-backed [`DocumentStore`].
///
/// Reads go through a `docs` CTE that left-joins the source table (one row per
/// document, a value and a score column per field) with the verification
/// table (`file_name`, `verification_date`). The only write is the append-only
/// verification insert.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Connection,
    tables: Tables,
    fields: Vec<FieldDefinition>,
    stage_dir: PathBuf,
}

impl DuckStore {
    /// Open the database named by `config.database`, or an in-memory one.
    pub fn open(config: &ReviewConfig) -> Result<Self, StoreError> {
        let conn = match &config.database {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Ok(Self::with_connection(conn, config))
    }

    pub fn open_in_memory(config: &ReviewConfig) -> Result<Self, StoreError> {
        Ok(Self::with_connection(Connection::open_in_memory()?, config))
    }

    fn with_connection(conn: Connection, config: &ReviewConfig) -> Self {
        Self {
            conn,
            tables: Tables::new(
                config.schema.as_deref(),
                &config.source_table,
                &config.verify_table,
            ),
            fields: config.fields.clone(),
            stage_dir: config.stage_dir.clone(),
        }
    }

    /// Create the schema, verification table and (if absent) an empty source
    /// table shaped after the field definitions.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        if let Some(ddl) = sql::create_schema(&self.tables) {
            self.conn.execute_batch(&ddl)?;
        }
        self.conn
            .execute_batch(&sql::create_source_table(&self.tables, &self.fields))?;
        self.conn
            .execute_batch(&sql::create_verify_table(&self.tables))?;
        info!(source = %self.tables.source, verify = %self.tables.verify, "schema ready");
        Ok(())
    }

    /// Check whether both tables exist. Catalog read failures are errors,
    /// not a missing table.
    pub fn has_tables(&self) -> Result<bool, StoreError> {
        Ok(self.query_count(&sql::count_tables(&self.tables))? == 2)
    }

    /// Replace the source table with the rows of a Parquet or CSV file.
    ///
    /// Returns the number of rows loaded.
    pub fn import_source(&self, path: &Path) -> Result<usize, StoreError> {
        if !path.exists() {
            return Err(StoreError::ImportNotFound(path.to_path_buf()));
        }
        let reader = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => "read_parquet",
            Some(ext) if ext.eq_ignore_ascii_case("csv") => "read_csv_auto",
            _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        };
        let literal = path.display().to_string().replace('\'', "''");
        let ddl = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM {reader}('{literal}')",
            self.tables.source
        );
        self.conn.execute_batch(&ddl)?;
        let count = self.count_table(&self.tables.source)?;
        info!(count, path = %path.display(), "imported source documents");
        Ok(count)
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let frag = SqlFragment {
            sql: format!("SELECT count(*)::BIGINT AS cnt FROM {table}"),
            params: Vec::new(),
        };
        self.query_count(&frag)
    }

    fn query_count(&self, frag: &SqlFragment) -> Result<usize, StoreError> {
        let batches = self.query(frag)?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    fn query(&self, frag: &SqlFragment) -> Result<Vec<RecordBatch>, StoreError> {
        debug!(sql = %frag.sql, params = frag.params.len(), "duckdb query");
        let mut stmt = self.conn.prepare(&frag.sql)?;
        let params = frag.params.iter().map(|p| match p {
            SqlParam::Text(s) => Value::Text(s.clone()),
            SqlParam::Real(r) => Value::Double(*r),
        });
        let batches: Vec<RecordBatch> = stmt.query_arrow(params_from_iter(params))?.collect();
        Ok(batches)
    }

    fn documents(&self, frag: &SqlFragment) -> Result<Vec<DocumentRecord>, StoreError> {
        decode_documents(&self.query(frag)?, &self.fields)
    }
}

impl DocumentStore for DuckStore {
    fn fetch_all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        self.documents(&sql::select_documents(&self.tables, &Relation::All))
    }

    fn fetch_outstanding(&self, filter: &Expr) -> Result<Vec<DocumentRecord>, StoreError> {
        let relation = Relation::Filtered(filter.clone());
        let docs = self.documents(&sql::select_documents(&self.tables, &relation))?;
        debug!(filter = %filter, count = docs.len(), "fetched outstanding documents");
        Ok(docs)
    }

    fn fetch_document(&self, file_name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self
            .documents(&sql::select_document(&self.tables, file_name))?
            .into_iter()
            .next())
    }

    fn count_rows(&self, relation: &Relation) -> Result<usize, StoreError> {
        self.query_count(&sql::count_rows(&self.tables, relation))
    }

    fn aggregate(
        &self,
        relation: &Relation,
        counts: &[CountSpec],
    ) -> Result<Vec<(String, u64)>, StoreError> {
        if counts.is_empty() {
            return Ok(Vec::new());
        }
        let batches = self.query(&sql::aggregate(&self.tables, relation, counts))?;
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or(StoreError::NoResults)?;
        counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let col = batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| StoreError::Other(format!("count {} not i64", count.label)))?;
                Ok((count.label.clone(), col.value(0) as u64))
            })
            .collect()
    }

    fn is_verified(&self, file_name: &str) -> Result<bool, StoreError> {
        Ok(self.query_count(&sql::select_verified(&self.tables, file_name))? > 0)
    }

    fn insert_verification(
        &self,
        file_name: &str,
        at: NaiveDateTime,
    ) -> Result<InsertOutcome, StoreError> {
        let stamp = at.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let sql = sql::insert_verification(&self.tables);
        match self
            .conn
            .execute(&sql, params![file_name, stamp, file_name, file_name])
        {
            Ok(0) if self.is_verified(file_name)? => {
                warn!(file_name, "document already verified; nothing written");
                Ok(InsertOutcome::AlreadyVerified)
            }
            Ok(0) => {
                warn!(file_name, "no source document with this name; nothing written");
                Err(StoreError::NoResults)
            }
            Ok(_) => {
                info!(file_name, verification_date = %stamp, "verification recorded");
                Ok(InsertOutcome::Inserted)
            }
            // A concurrent writer can win the race between NOT EXISTS and the
            // primary key check.
            Err(e) => {
                if self.is_verified(file_name)? {
                    warn!(file_name, error = %e, "lost insert race; document already verified");
                    Ok(InsertOutcome::AlreadyVerified)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn fetch_document_blob(&self, file_name: &str) -> Result<Vec<u8>, StoreError> {
        let path = resolve_blob_path(&self.stage_dir, file_name)?;
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "read document blob");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}
