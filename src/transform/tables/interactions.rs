use crate::domain::{Row, RowValue};
use crate::transform::coercion::canonical_channel;
use crate::transform::registry::RowTransformer;

/// Shared transformer for the bot and human interaction tables; they differ
/// only in which channel value they default missing rows to.
pub struct InteractionsTransformer {
    default_channel: &'static str,
}

impl InteractionsTransformer {
    pub fn bot() -> Self {
        Self { default_channel: "BOT" }
    }

    pub fn human() -> Self {
        Self { default_channel: "HUMANO" }
    }
}

impl RowTransformer for InteractionsTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        if row.get("uid").map(RowValue::is_null).unwrap_or(true) {
            return None;
        }

        let canal = row
            .get("canal")
            .map(canonical_channel)
            .unwrap_or(self.default_channel);
        row.insert("canal".to_string(), RowValue::Text(canal.to_string()));

        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(pairs: &[(&str, RowValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn drops_rows_without_uid() {
        let row = row_with(&[("uid", RowValue::Null)]);
        assert!(InteractionsTransformer::bot().transform(row).is_none());
    }

    #[test]
    fn missing_channel_falls_back_to_constructor_default() {
        let row = row_with(&[("uid", RowValue::Text("abc".into()))]);
        let out = InteractionsTransformer::human().transform(row).unwrap();
        assert_eq!(out["canal"], RowValue::Text("HUMANO".into()));
    }
}
