// RowTransformer registry (C6) - dispatches a raw row batch to the
// per-table transform function by logical table name.
use crate::domain::{EtlStats, Row, RowBatch};
use crate::error::{EtlError, Result};
use crate::transform::tables;

pub trait RowTransformer: Send + Sync {
    /// Transforms one row, returning `None` if the row should be dropped
    /// (missing primary key, failed required-field check, etc).
    fn transform(&self, row: Row) -> Option<Row>;
}

pub struct TransformerRegistry;

impl TransformerRegistry {
    /// Runs `table_name`'s transformer over `batch`, folding drops into
    /// `stats` rather than erroring the whole batch.
    pub fn transform_batch(table_name: &str, batch: RowBatch, stats: &mut EtlStats) -> Result<RowBatch> {
        let transformer = Self::for_table(table_name)?;
        stats.processed += batch.len() as u64;

        let mut out = Vec::with_capacity(batch.len());
        for row in batch {
            match transformer.transform(row) {
                Some(transformed) => {
                    stats.transformed += 1;
                    out.push(transformed);
                }
                None => stats.skipped += 1,
            }
        }
        Ok(out)
    }

    fn for_table(table_name: &str) -> Result<Box<dyn RowTransformer>> {
        let transformer: Box<dyn RowTransformer> = match table_name {
            "assignments" => Box::new(tables::assignments::AssignmentsTransformer),
            "debts" => Box::new(tables::debts::DebtsTransformer),
            "payments" => Box::new(tables::payments::PaymentsTransformer),
            "bot_interactions" => Box::new(tables::interactions::InteractionsTransformer::bot()),
            "human_interactions" => Box::new(tables::interactions::InteractionsTransformer::human()),
            "homologation_bot" | "homologation_human" => Box::new(tables::homologation::HomologationTransformer),
            "agents" => Box::new(tables::agents::AgentsTransformer),
            "calendar" => Box::new(tables::calendar::CalendarTransformer),
            other => return Err(EtlError::UnknownTable(other.to_string())),
        };
        Ok(transformer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RowValue;

    #[test]
    fn unknown_table_is_an_error() {
        assert!(TransformerRegistry::for_table("nope").is_err());
    }

    #[test]
    fn transform_batch_counts_skipped_rows_without_failing() {
        let mut row_ok = Row::new();
        row_ok.insert("cod_luna".into(), RowValue::Text("1".into()));
        row_ok.insert("cuenta".into(), RowValue::Text("2".into()));
        row_ok.insert("archivo".into(), RowValue::Text("C_2025_01".into()));

        let row_missing_pk = Row::new();

        let mut stats = EtlStats::default();
        let out = TransformerRegistry::transform_batch(
            "assignments",
            vec![row_ok, row_missing_pk],
            &mut stats,
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.transformed, 1);
    }
}
