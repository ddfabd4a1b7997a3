use crate::domain::{Row, RowValue};
use crate::transform::coercion::trimmed_text;
use crate::transform::registry::RowTransformer;

pub struct AgentsTransformer;

impl RowTransformer for AgentsTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        if row.get("correo_name").map(RowValue::is_null).unwrap_or(true) {
            return None;
        }
        if let Some(v) = row.get("correo_name") {
            row.insert("correo_name".to_string(), trimmed_text(v));
        }
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_rows_without_an_email_key() {
        let mut row = Row::new();
        row.insert("correo_name".to_string(), RowValue::Null);
        assert!(AgentsTransformer.transform(row).is_none());
    }
}
