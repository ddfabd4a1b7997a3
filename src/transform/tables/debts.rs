use crate::domain::{Row, RowValue};
use crate::transform::coercion::coerce_decimal;
use crate::transform::registry::RowTransformer;

pub struct DebtsTransformer;

impl RowTransformer for DebtsTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        for pk in ["cod_cuenta", "nro_documento", "archivo"] {
            if row.get(pk).map(RowValue::is_null).unwrap_or(true) {
                return None;
            }
        }

        let monto = row.get("monto_exigible").map(coerce_decimal).unwrap_or(0.0);
        if monto <= 0.0 {
            return None;
        }
        row.insert("monto_exigible".to_string(), RowValue::Float(monto));

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
    fn drops_zero_and_negative_debt_rows() {
        let row = row_with(&[
            ("cod_cuenta", RowValue::Text("1".into())),
            ("nro_documento", RowValue::Text("2".into())),
            ("archivo", RowValue::Text("C_2025_01".into())),
            ("monto_exigible", RowValue::Text("0".into())),
        ]);
        assert!(DebtsTransformer.transform(row).is_none());
    }

    #[test]
    fn keeps_positive_debt_rows_as_float() {
        let row = row_with(&[
            ("cod_cuenta", RowValue::Text("1".into())),
            ("nro_documento", RowValue::Text("2".into())),
            ("archivo", RowValue::Text("C_2025_01".into())),
            ("monto_exigible", RowValue::Text("150.5".into())),
        ]);
        let out = DebtsTransformer.transform(row).unwrap();
        assert_eq!(out["monto_exigible"], RowValue::Float(150.5));
    }
}
