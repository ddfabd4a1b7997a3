use crate::domain::{Row, RowValue};
use crate::transform::coercion::coerce_bool;
use crate::transform::registry::RowTransformer;

pub struct CalendarTransformer;

impl RowTransformer for CalendarTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        if row.get("archivo").map(RowValue::is_null).unwrap_or(true) {
            return None;
        }
        if row.get("fecha_apertura").map(RowValue::is_null).unwrap_or(true) {
            return None;
        }

        if let Some(v) = row.get("es_cartera_abierta") {
            row.insert("es_cartera_abierta".to_string(), RowValue::Bool(coerce_bool(v)));
        }

        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_rows_missing_the_opening_date() {
        let mut row = Row::new();
        row.insert("archivo".to_string(), RowValue::Text("C_2025_01".into()));
        row.insert("fecha_apertura".to_string(), RowValue::Null);
        assert!(CalendarTransformer.transform(row).is_none());
    }

    #[test]
    fn coerces_open_flag_to_bool() {
        let mut row = Row::new();
        row.insert("archivo".to_string(), RowValue::Text("C_2025_01".into()));
        row.insert("fecha_apertura".to_string(), RowValue::Text("2025-01-01".into()));
        row.insert("es_cartera_abierta".to_string(), RowValue::Text("si".into()));
        let out = CalendarTransformer.transform(row).unwrap();
        assert_eq!(out["es_cartera_abierta"], RowValue::Bool(true));
    }
}
