use crate::domain::{Row, RowValue};
use crate::transform::coercion::{coerce_int, trimmed_text};
use crate::transform::registry::RowTransformer;

pub struct AssignmentsTransformer;

impl RowTransformer for AssignmentsTransformer {
    fn transform(&self, mut row: Row) -> Option<Row> {
        for pk in ["cod_luna", "cuenta", "archivo"] {
            if row.get(pk).map(RowValue::is_null).unwrap_or(true) {
                return None;
            }
        }

        for text_col in [
            "cliente", "telefono", "tramo_gestion", "negocio", "zona", "dni", "estado_pc",
        ] {
            if let Some(v) = row.get(text_col) {
                row.insert(text_col.to_string(), trimmed_text(v));
            }
        }

        for int_col in ["decil_contacto", "decil_pago", "rango_renta", "cod_sistema"] {
            if let Some(v) = row.get(int_col) {
                row.insert(int_col.to_string(), coerce_int(v));
            }
        }

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
    fn drops_rows_with_missing_primary_key() {
        let row = row_with(&[
            ("cod_luna", RowValue::Text("1".into())),
            ("cuenta", RowValue::Null),
            ("archivo", RowValue::Text("C_2025_01".into())),
        ]);
        assert!(AssignmentsTransformer.transform(row).is_none());
    }

    #[test]
    fn trims_text_columns_and_parses_deciles() {
        let row = row_with(&[
            ("cod_luna", RowValue::Text("1".into())),
            ("cuenta", RowValue::Text("2".into())),
            ("archivo", RowValue::Text("C_2025_01".into())),
            ("cliente", RowValue::Text("  Jane Doe  ".into())),
            ("decil_contacto", RowValue::Text("7".into())),
        ]);
        let out = AssignmentsTransformer.transform(row).unwrap();
        assert_eq!(out["cliente"], RowValue::Text("Jane Doe".into()));
        assert_eq!(out["decil_contacto"], RowValue::Int(7));
    }
}
