//! Translation of review queries into DuckDB SQL.
//!
//! Identifiers are always double-quoted; values (thresholds, file names,
//! timestamps) are always bound parameters.

use docreview_core::{CountSpec, Expr, FieldDefinition};

use crate::Relation;

pub const FILE_NAME_COLUMN: &str = "file_name";
pub const VERIFICATION_DATE_COLUMN: &str = "verification_date";

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Real(f64),
}

/// SQL text with `?` placeholders and their values, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    fn append(&mut self, other: SqlFragment) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }
}

/// Quoted, optionally schema-qualified names of the two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub schema: Option<String>,
    pub source: String,
    pub verify: String,
    /// Unquoted names, for catalog lookups.
    schema_name: Option<String>,
    source_name: String,
    verify_name: String,
}

impl Tables {
    pub fn new(schema: Option<&str>, source: &str, verify: &str) -> Self {
        Self {
            schema: schema.map(quote_ident),
            source: qualified(schema, source),
            verify: qualified(schema, verify),
            schema_name: schema.map(str::to_string),
            source_name: source.to_string(),
            verify_name: verify.to_string(),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(s) => format!("{}.{}", quote_ident(s), quote_ident(table)),
        None => quote_ident(table),
    }
}

/// Render a predicate as a WHERE-clause expression.
pub fn render_expr(expr: &Expr) -> SqlFragment {
    let mut out = SqlFragment::default();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut SqlFragment) {
    match expr {
        Expr::ValueMissing { column, .. } => {
            out.push(&format!("{} IS NULL", quote_ident(column)));
        }
        Expr::ScoreAtMost {
            column, threshold, ..
        } => {
            out.push(&format!("{} <= ?", quote_ident(column)));
            out.params.push(SqlParam::Real(*threshold));
        }
        Expr::NotVerified => {
            out.push(&format!("{} IS NULL", quote_ident(VERIFICATION_DATE_COLUMN)));
        }
        Expr::Any(exprs) => write_joined(exprs, " OR ", "FALSE", out),
        Expr::All(exprs) => write_joined(exprs, " AND ", "TRUE", out),
    }
}

fn write_joined(exprs: &[Expr], sep: &str, empty: &str, out: &mut SqlFragment) {
    if exprs.is_empty() {
        out.push(empty);
        return;
    }
    out.push("(");
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        write_expr(e, out);
    }
    out.push(")");
}

/// `WITH docs AS (...)`: every source row with its verification date, if any.
///
/// Verifications are grouped by file name so a duplicated record can never
/// duplicate a document row.
fn docs_cte(tables: &Tables) -> String {
    format!(
        "WITH docs AS (\
            SELECT s.*, v.{vd} \
            FROM {source} AS s \
            LEFT JOIN (\
                SELECT {fname}, min({vd}) AS {vd} FROM {verify} GROUP BY {fname}\
            ) AS v ON s.{fname} = v.{fname}\
        ) ",
        vd = VERIFICATION_DATE_COLUMN,
        fname = FILE_NAME_COLUMN,
        source = tables.source,
        verify = tables.verify,
    )
}

fn write_where(relation: &Relation, out: &mut SqlFragment) {
    if let Relation::Filtered(expr) = relation {
        out.push(" WHERE ");
        out.append(render_expr(expr));
    }
}

pub fn select_documents(tables: &Tables, relation: &Relation) -> SqlFragment {
    let mut out = SqlFragment::default();
    out.push(&docs_cte(tables));
    out.push("SELECT * FROM docs");
    write_where(relation, &mut out);
    out.push(&format!(" ORDER BY {FILE_NAME_COLUMN}"));
    out
}

pub fn select_document(tables: &Tables, file_name: &str) -> SqlFragment {
    let mut out = SqlFragment::default();
    out.push(&docs_cte(tables));
    out.push(&format!("SELECT * FROM docs WHERE {FILE_NAME_COLUMN} = ? LIMIT 1"));
    out.params.push(SqlParam::Text(file_name.to_string()));
    out
}

pub fn count_rows(tables: &Tables, relation: &Relation) -> SqlFragment {
    let mut out = SqlFragment::default();
    out.push(&docs_cte(tables));
    out.push("SELECT count(*)::BIGINT AS cnt FROM docs");
    write_where(relation, &mut out);
    out
}

/// One `count(*) FILTER (WHERE ...)` column per `CountSpec`, aliased by label.
///
/// Callers must not pass an empty list.
pub fn aggregate(tables: &Tables, relation: &Relation, counts: &[CountSpec]) -> SqlFragment {
    let mut out = SqlFragment::default();
    out.push(&docs_cte(tables));
    out.push("SELECT ");
    for (i, count) in counts.iter().enumerate() {
        if i > 0 {
            out.push(", ");
        }
        out.push("count(*) FILTER (WHERE ");
        out.append(render_expr(&count.condition));
        out.push(&format!(") AS {}", quote_ident(&count.label)));
    }
    out.push(" FROM docs");
    write_where(relation, &mut out);
    out
}

pub fn select_verified(tables: &Tables, file_name: &str) -> SqlFragment {
    SqlFragment {
        sql: format!(
            "SELECT count(*)::BIGINT AS cnt FROM {} WHERE {FILE_NAME_COLUMN} = ?",
            tables.verify
        ),
        params: vec![SqlParam::Text(file_name.to_string())],
    }
}

/// Number of the source and verification tables present in the catalog
/// (0, 1 or 2) for the current database.
pub fn count_tables(tables: &Tables) -> SqlFragment {
    let schema = match &tables.schema_name {
        Some(name) => SqlParam::Text(name.clone()),
        None => SqlParam::Text(String::new()),
    };
    SqlFragment {
        sql: "SELECT count(*)::BIGINT AS cnt FROM duckdb_tables() \
              WHERE database_name = current_database() \
              AND lower(schema_name) = lower(coalesce(nullif(?, ''), current_schema())) \
              AND lower(table_name) IN (lower(?), lower(?))"
            .to_string(),
        params: vec![
            schema,
            SqlParam::Text(tables.source_name.clone()),
            SqlParam::Text(tables.verify_name.clone()),
        ],
    }
}

/// Append-only insert that writes nothing if the file is already verified or
/// is not a source document.
///
/// Parameters: file name, timestamp text, file name, file name.
pub fn insert_verification(tables: &Tables) -> String {
    format!(
        "INSERT INTO {verify} ({fname}, {vd}) \
         SELECT CAST(? AS VARCHAR), CAST(? AS TIMESTAMP) \
         WHERE NOT EXISTS (SELECT 1 FROM {verify} WHERE {fname} = CAST(? AS VARCHAR)) \
         AND EXISTS (SELECT 1 FROM {source} WHERE {fname} = CAST(? AS VARCHAR))",
        verify = tables.verify,
        source = tables.source,
        fname = FILE_NAME_COLUMN,
        vd = VERIFICATION_DATE_COLUMN,
    )
}

pub fn create_schema(tables: &Tables) -> Option<String> {
    tables
        .schema
        .as_ref()
        .map(|s| format!("CREATE SCHEMA IF NOT EXISTS {s}"))
}

pub fn create_verify_table(tables: &Tables) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
            {FILE_NAME_COLUMN} VARCHAR PRIMARY KEY, \
            {VERIFICATION_DATE_COLUMN} TIMESTAMP NOT NULL\
        )",
        tables.verify
    )
}

/// Source table shaped after the field definitions: one VARCHAR value and one
/// DOUBLE score column per field.
pub fn create_source_table(tables: &Tables, fields: &[FieldDefinition]) -> String {
    let mut columns = vec![format!("{} VARCHAR PRIMARY KEY", quote_ident("FILE_NAME"))];
    for f in fields {
        columns.push(format!("{} VARCHAR", quote_ident(&f.value_column)));
        columns.push(format!("{} DOUBLE", quote_ident(&f.score_column)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        tables.source,
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docreview_core::{needs_review_filter, per_field_missing_counts};

    fn tables() -> Tables {
        Tables::new(None, "DOCS", "DOCS_VERIFIED")
    }

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_ident("EFFECTIVE_DATE_VALUE"), "\"EFFECTIVE_DATE_VALUE\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        let t = Tables::new(Some("doc_ai"), "A", "B");
        assert_eq!(t.source, "\"doc_ai\".\"A\"");
        assert_eq!(t.verify, "\"doc_ai\".\"B\"");
    }

    #[test]
    fn filter_binds_thresholds() {
        let fields = vec![
            FieldDefinition::new("EFFECTIVE_DATE"),
            FieldDefinition::new("NOTICE_PERIOD"),
        ];
        let frag = render_expr(&needs_review_filter(&fields, 0.5));
        assert_eq!(
            frag.sql,
            "(((\"EFFECTIVE_DATE_SCORE\" <= ? OR \"EFFECTIVE_DATE_VALUE\" IS NULL) OR \
             (\"NOTICE_PERIOD_SCORE\" <= ? OR \"NOTICE_PERIOD_VALUE\" IS NULL)) AND \
             \"verification_date\" IS NULL)"
        );
        assert_eq!(frag.params, vec![SqlParam::Real(0.5), SqlParam::Real(0.5)]);
    }

    #[test]
    fn empty_filter_renders_false() {
        let frag = render_expr(&needs_review_filter(&[], 0.5));
        assert_eq!(frag.sql, "(FALSE AND \"verification_date\" IS NULL)");
        assert!(frag.params.is_empty());
    }

    #[test]
    fn select_document_binds_file_name() {
        let frag = select_document(&tables(), "x'; DROP TABLE DOCS; --");
        assert!(!frag.sql.contains("DROP"));
        assert_eq!(
            frag.params,
            vec![SqlParam::Text("x'; DROP TABLE DOCS; --".into())]
        );
    }

    #[test]
    fn aggregate_params_follow_placeholder_order() {
        let fields = vec![FieldDefinition::new("A"), FieldDefinition::new("B")];
        let filter = needs_review_filter(&fields, 0.25);
        let counts = per_field_missing_counts(&fields, 0.75);
        let frag = aggregate(&tables(), &Relation::Filtered(filter), &counts);

        assert_eq!(frag.sql.matches('?').count(), frag.params.len());
        assert_eq!(
            frag.params,
            vec![
                SqlParam::Real(0.75),
                SqlParam::Real(0.75),
                SqlParam::Real(0.25),
                SqlParam::Real(0.25),
            ]
        );
        assert!(frag.sql.contains("AS \"A\", count(*)"));
        assert!(frag.sql.ends_with("\"verification_date\" IS NULL)"));
    }

    #[test]
    fn count_all_has_no_where() {
        let frag = count_rows(&tables(), &Relation::All);
        assert!(!frag.sql.contains("WHERE"));
        assert!(frag.sql.contains("LEFT JOIN"));
    }

    #[test]
    fn insert_is_guarded_against_duplicates() {
        let sql = insert_verification(&tables());
        assert!(sql.starts_with("INSERT INTO \"DOCS_VERIFIED\""));
        assert!(sql.contains("WHERE NOT EXISTS"));
        assert!(sql.contains("AND EXISTS (SELECT 1 FROM \"DOCS\" WHERE file_name"));
        assert_eq!(sql.matches('?').count(), 4);
    }

    #[test]
    fn table_lookup_binds_raw_names() {
        let frag = count_tables(&Tables::new(Some("doc_ai"), "Src", "Ver"));
        assert_eq!(frag.sql.matches('?').count(), 3);
        assert_eq!(
            frag.params,
            vec![
                SqlParam::Text("doc_ai".into()),
                SqlParam::Text("Src".into()),
                SqlParam::Text("Ver".into()),
            ]
        );
        assert_eq!(count_tables(&tables()).params[0], SqlParam::Text(String::new()));
    }

    #[test]
    fn source_table_has_column_pair_per_field() {
        let sql = create_source_table(&tables(), &[FieldDefinition::new("EFFECTIVE_DATE")]);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"DOCS\" (\"FILE_NAME\" VARCHAR PRIMARY KEY, \
             \"EFFECTIVE_DATE_VALUE\" VARCHAR, \"EFFECTIVE_DATE_SCORE\" DOUBLE)"
        );
    }

    #[test]
    fn schema_only_created_when_configured() {
        assert!(create_schema(&tables()).is_none());
        assert_eq!(
            create_schema(&Tables::new(Some("doc_ai"), "A", "B")).as_deref(),
            Some("CREATE SCHEMA IF NOT EXISTS \"doc_ai\"")
        );
    }
}
