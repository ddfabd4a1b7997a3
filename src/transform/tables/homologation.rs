use crate::domain::{Row, RowValue};
use crate::transform::coercion::trimmed_text;
use crate::transform::registry::RowTransformer;

/// Full-refresh dimension tables (homologation_bot/homologation_human) need
/// no key validation — every row from the warehouse replaces the table.
pub struct HomologationTransformer;

impl RowTransformer for HomologationTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        let keys: Vec<String> = row.keys().cloned().collect();
        for key in keys {
            if let Some(v) = row.get(&key) {
                if matches!(v, RowValue::Text(_)) {
                    row.insert(key, trimmed_text(v));
                }
            }
        }
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_every_text_column() {
        let mut row = Row::new();
        row.insert("bot_management".to_string(), RowValue::Text("  A  ".into()));
        let out = HomologationTransformer.transform(row).unwrap();
        assert_eq!(out["bot_management"], RowValue::Text("A".into()));
    }
}
