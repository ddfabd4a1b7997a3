use crate::domain::{Row, RowValue};
use crate::transform::coercion::coerce_decimal;
use crate::transform::registry::RowTransformer;

pub struct PaymentsTransformer;

impl RowTransformer for PaymentsTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        for pk in ["nro_documento", "fecha_pago"] {
            if row.get(pk).map(RowValue::is_null).unwrap_or(true) {
                return None;
            }
        }

        let monto = row.get("monto_cancelado").map(coerce_decimal).unwrap_or(0.0);
        row.insert("monto_cancelado".to_string(), RowValue::Float(monto));

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
    fn drops_rows_missing_payment_date() {
        let row = row_with(&[
            ("nro_documento", RowValue::Text("2".into())),
            ("fecha_pago", RowValue::Null),
        ]);
        assert!(PaymentsTransformer.transform(row).is_none());
    }

    #[test]
    fn coerces_amount_to_float() {
        let row = row_with(&[
            ("nro_documento", RowValue::Text("2".into())),
            ("fecha_pago", RowValue::Text("2025-01-05".into())),
            ("monto_cancelado", RowValue::Text("42.3".into())),
        ]);
        let out = PaymentsTransformer.transform(row).unwrap();
        assert_eq!(out["monto_cancelado"], RowValue::Float(42.3));
    }
}
