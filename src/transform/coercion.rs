// Shared scalar coercion helpers used by every table transformer.
//
// Transformation here is deliberately light: type conversion and basic
// cleaning, preserving the raw data for the business logic that happens at
// the mart layer.
use crate::domain::RowValue;

const TRUTHY: &[&str] = &["true", "1", "yes", "si", "sí"];

/// Trims a text value and turns an empty result into a null, per the
/// trim/empty-to-null rule every table transformer applies to its text
/// columns.
pub fn trimmed_text(value: &RowValue) -> RowValue {
    match value.as_text() {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                RowValue::Null
            } else {
                RowValue::Text(trimmed.to_string())
            }
        }
        None => value.clone(),
    }
}

/// Truncates a text value to `max_len` bytes, leaving shorter strings and
/// non-text values untouched.
pub fn truncate_text(value: &RowValue, max_len: usize) -> RowValue {
    match value {
        RowValue::Text(s) if s.len() > max_len => {
            RowValue::Text(s.chars().take(max_len).collect())
        }
        other => other.clone(),
    }
}

/// Parses an integer, stripping anything but digits and a leading minus
/// sign first (the warehouse sometimes sends `"1,234"` or `"N/A"`-tainted
/// numeric-looking columns).
pub fn coerce_int(value: &RowValue) -> RowValue {
    match value {
        RowValue::Int(_) => value.clone(),
        RowValue::Float(f) => RowValue::Int(*f as i64),
        RowValue::Text(s) => {
            let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
            cleaned.parse::<i64>().map(RowValue::Int).unwrap_or(RowValue::Null)
        }
        RowValue::Null => RowValue::Null,
        _ => RowValue::Null,
    }
}

/// Parses a decimal amount, defaulting to `0.0` rather than null so that
/// downstream `monto > 0` checks never choke on a missing value.
pub fn coerce_decimal(value: &RowValue) -> f64 {
    match value {
        RowValue::Float(f) => *f,
        RowValue::Int(i) => *i as f64,
        RowValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Normalizes a boolean-ish value the way the warehouse encodes it:
/// `true`/`1`/`yes`/`si`/`sí` (case-insensitive) are true, everything else
/// is false.
pub fn coerce_bool(value: &RowValue) -> bool {
    match value {
        RowValue::Bool(b) => *b,
        RowValue::Int(i) => *i != 0,
        RowValue::Text(s) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Canonicalizes the interaction channel to one of two values; anything
/// outside the known aliases defaults to the bot channel.
pub fn canonical_channel(value: &RowValue) -> &'static str {
    let Some(raw) = value.as_text() else {
        return "BOT";
    };
    match raw.trim().to_uppercase().as_str() {
        "BOT" | "VOICEBOT" => "BOT",
        "HUMANO" | "HUMAN" | "CALL_CENTER" | "CALL CENTER" => "HUMANO",
        _ => "BOT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_nullifies_blank_text() {
        assert_eq!(trimmed_text(&RowValue::Text("  hi  ".into())), RowValue::Text("hi".into()));
        assert_eq!(trimmed_text(&RowValue::Text("   ".into())), RowValue::Null);
    }

    #[test]
    fn strips_non_digits_before_parsing_int() {
        assert_eq!(coerce_int(&RowValue::Text("1,234".into())), RowValue::Int(1234));
        assert_eq!(coerce_int(&RowValue::Text("N/A".into())), RowValue::Null);
    }

    #[test]
    fn decimal_defaults_to_zero_not_null() {
        assert_eq!(coerce_decimal(&RowValue::Text("abc".into())), 0.0);
        assert_eq!(coerce_decimal(&RowValue::Text("12.5".into())), 12.5);
    }

    #[test]
    fn bool_recognizes_spanish_affirmatives() {
        assert!(coerce_bool(&RowValue::Text("Sí".into())));
        assert!(coerce_bool(&RowValue::Text("si".into())));
        assert!(!coerce_bool(&RowValue::Text("no".into())));
    }

    #[test]
    fn channel_defaults_to_bot_for_unknown_values() {
        assert_eq!(canonical_channel(&RowValue::Text("WHATSAPP".into())), "BOT");
        assert_eq!(canonical_channel(&RowValue::Text("call center".into())), "HUMANO");
    }
}
