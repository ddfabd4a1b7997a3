// Sink Writer (C2) - upserts row batches into the PostgreSQL sink.
//
// Builds a multi-row INSERT whose column list comes from whatever keys the
// batch's rows carry, since the column set here is data-driven (the table
// catalog) rather than one Rust struct per table.
use crate::domain::{LoadResult, LoadStatus, Row, RowBatch, RowValue, TableConfig};
use crate::error::Result;
use crate::sink::connection::Database;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};
use std::time::Instant;
use tracing::{debug, info};

const MAX_ROWS_PER_STATEMENT: usize = 500;

pub struct SinkWriter {
    db: Database,
}

impl SinkWriter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upserts one batch of already-transformed rows into `config`'s sink
    /// table. Rows missing a primary key column are dropped and counted as
    /// skipped rather than failing the whole batch.
    pub async fn load_batch(&self, config: &TableConfig, project_uid: &str, batch: RowBatch) -> Result<LoadResult> {
        let start = Instant::now();

        if batch.is_empty() {
            return Ok(LoadResult::empty_success());
        }

        let (valid, skipped) = Self::drop_rows_with_null_pk(config, batch);
        if valid.is_empty() {
            return Ok(LoadResult {
                total_received: skipped as u64,
                inserted: 0,
                updated: 0,
                skipped: skipped as u64,
                duration_seconds: start.elapsed().as_secs_f64(),
                status: LoadStatus::Success,
                error: None,
            });
        }

        let fq_table = config.fq_name(project_uid);
        let columns = Self::column_order(&valid);

        let mut inserted = 0u64;
        let mut updated = 0u64;
        for chunk in valid.chunks(MAX_ROWS_PER_STATEMENT) {
            let sql = Self::build_upsert_sql(&fq_table, &columns, config.primary_key, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for column in &columns {
                    let value = row.get(column.as_str()).unwrap_or(&RowValue::Null);
                    query = bind_value(query, value);
                }
            }
            let rows = query.fetch_all(self.db.pool()).await?;
            for row in &rows {
                if row.get::<bool, _>("was_inserted") {
                    inserted += 1;
                } else {
                    updated += 1;
                }
            }
        }

        debug!(table = %fq_table, inserted, updated, skipped, "sink batch upserted");

        Ok(LoadResult {
            total_received: (valid.len() + skipped) as u64,
            inserted,
            updated,
            skipped: skipped as u64,
            duration_seconds: start.elapsed().as_secs_f64(),
            status: LoadStatus::Success,
            error: None,
        })
    }

    /// Truncates `config`'s sink table and loads `data` as a fresh copy, for
    /// the full-refresh dimension tables. Truncate and reload run on one
    /// transaction so a failed reload leaves the prior contents intact.
    pub async fn truncate_and_load(&self, config: &TableConfig, project_uid: &str, data: RowBatch) -> Result<LoadResult> {
        let start = Instant::now();
        let fq_table = config.fq_name(project_uid);

        if data.is_empty() {
            let mut tx = self.db.pool().begin().await?;
            sqlx::query(&format!("TRUNCATE {fq_table} RESTART IDENTITY"))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(table = %fq_table, "truncated sink table for full refresh (empty reload)");
            return Ok(LoadResult::empty_success());
        }

        let (valid, skipped) = Self::drop_rows_with_null_pk(config, data);
        let columns = Self::column_order(&valid);

        let mut tx = self.db.pool().begin().await?;
        sqlx::query(&format!("TRUNCATE {fq_table} RESTART IDENTITY"))
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u64;
        let mut updated = 0u64;
        for chunk in valid.chunks(MAX_ROWS_PER_STATEMENT) {
            let sql = Self::build_upsert_sql(&fq_table, &columns, config.primary_key, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for column in &columns {
                    let value = row.get(column.as_str()).unwrap_or(&RowValue::Null);
                    query = bind_value(query, value);
                }
            }
            let rows = query.fetch_all(&mut *tx).await?;
            for row in &rows {
                if row.get::<bool, _>("was_inserted") {
                    inserted += 1;
                } else {
                    updated += 1;
                }
            }
        }

        tx.commit().await?;
        info!(table = %fq_table, inserted, updated, "truncated and reloaded sink table for full refresh");

        Ok(LoadResult {
            total_received: (valid.len() + skipped) as u64,
            inserted,
            updated,
            skipped: skipped as u64,
            duration_seconds: start.elapsed().as_secs_f64(),
            status: LoadStatus::Success,
            error: None,
        })
    }

    fn drop_rows_with_null_pk(config: &TableConfig, batch: RowBatch) -> (RowBatch, usize) {
        let mut skipped = 0;
        let valid = batch
            .into_iter()
            .filter(|row| {
                let ok = config.primary_key.iter().all(|pk| {
                    row.get(*pk).map(|v| !v.is_null()).unwrap_or(false)
                });
                if !ok {
                    skipped += 1;
                }
                ok
            })
            .collect();
        (valid, skipped)
    }

    /// A stable column ordering across the whole batch, derived from the
    /// union of keys present in its rows.
    fn column_order(batch: &[Row]) -> Vec<String> {
        let mut columns: Vec<String> = batch
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        columns.sort();
        columns
    }

    fn build_upsert_sql(fq_table: &str, columns: &[String], primary_key: &[&str], row_count: usize) -> String {
        let columns_str = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let pk_str = primary_key.iter().map(|pk| format!("\"{pk}\"")).collect::<Vec<_>>().join(", ");

        let update_columns: Vec<&String> = columns
            .iter()
            .filter(|c| !primary_key.contains(&c.as_str()))
            .collect();

        let mut sql = format!("INSERT INTO {fq_table} ({columns_str}) VALUES ");
        for row_idx in 0..row_count {
            if row_idx > 0 {
                sql.push_str(", ");
            }
            let base = row_idx * columns.len();
            let placeholders = (0..columns.len())
                .map(|i| format!("${}", base + i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!("({placeholders})"));
        }

        if update_columns.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({pk_str}) DO NOTHING"));
        } else {
            let set_clause = update_columns
                .iter()
                .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ON CONFLICT ({pk_str}) DO UPDATE SET {set_clause}"));
        }

        // xmax = 0 identifies a row that was freshly inserted rather than
        // updated by the ON CONFLICT clause (a touched row's xmax is set to
        // the updating transaction's id).
        sql.push_str(" RETURNING (xmax = 0) AS was_inserted");

        sql
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q RowValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        RowValue::Null => query.bind(Option::<String>::None),
        RowValue::Bool(b) => query.bind(*b),
        RowValue::Int(i) => query.bind(*i),
        RowValue::Float(f) => query.bind(*f),
        RowValue::Text(s) => query.bind(s.as_str()),
        RowValue::Date(d) => query.bind(*d),
        RowValue::Timestamp(t) => query.bind(*t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog;

    fn row_with(pairs: &[(&str, RowValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn drops_rows_with_null_primary_key_components() {
        let config = catalog().require("assignments").unwrap();
        let batch = vec![
            row_with(&[
                ("cod_luna", RowValue::Text("1".into())),
                ("cuenta", RowValue::Text("2".into())),
                ("archivo", RowValue::Text("C".into())),
            ]),
            row_with(&[
                ("cod_luna", RowValue::Text("1".into())),
                ("cuenta", RowValue::Null),
                ("archivo", RowValue::Text("C".into())),
            ]),
        ];
        let (valid, skipped) = SinkWriter::drop_rows_with_null_pk(config, batch);
        assert_eq!(valid.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn upsert_sql_includes_on_conflict_update_for_non_pk_columns() {
        let columns = vec!["archivo".to_string(), "cliente".to_string(), "cod_luna".to_string()];
        let sql = SinkWriter::build_upsert_sql("raw_p3fv.assignments", &columns, &["archivo", "cod_luna"], 2);
        assert!(sql.contains("ON CONFLICT (\"archivo\", \"cod_luna\") DO UPDATE SET"));
        assert!(sql.contains("\"cliente\" = EXCLUDED.\"cliente\""));
        assert!(sql.contains("($1, $2, $3), ($4, $5, $6)"));
    }

    #[test]
    fn upsert_sql_falls_back_to_do_nothing_when_every_column_is_a_key() {
        let columns = vec!["archivo".to_string()];
        let sql = SinkWriter::build_upsert_sql("raw_p3fv.calendar", &columns, &["archivo"], 1);
        assert!(sql.contains("DO NOTHING"));
    }

    #[test]
    fn upsert_sql_returns_whether_each_row_was_inserted() {
        let columns = vec!["archivo".to_string(), "cliente".to_string()];
        let sql = SinkWriter::build_upsert_sql("raw_p3fv.assignments", &columns, &["archivo"], 1);
        assert!(sql.ends_with("RETURNING (xmax = 0) AS was_inserted"));
    }
}
