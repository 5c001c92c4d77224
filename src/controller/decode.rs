//! Typed field access over controller JSON responses.
//!
//! Every accessor fails with [`ControllerError::Parse`] naming the
//! offending field, e.g. `data[3].numberOfCalls`.

use serde_json::{Map, Number, Value};

use super::{ControllerError, Stage};

/// Parse a response body as JSON.
pub(crate) fn parse_body(stage: Stage, body: &str) -> Result<Value, ControllerError> {
    serde_json::from_str(body).map_err(|e| parse_error(stage, "$", e.to_string()))
}

/// Expect `value` to be a JSON array.
pub(crate) fn array<'a>(stage: Stage, path: &str, value: &'a Value) -> Result<&'a [Value], ControllerError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| parse_error(stage, path, format!("expected array, got {}", kind(value))))
}

/// A JSON object being decoded, with its location in the response.
pub(crate) struct Record<'a> {
    stage: Stage,
    path: String,
    fields: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    pub fn new(stage: Stage, path: String, value: &'a Value) -> Result<Self, ControllerError> {
        match value.as_object() {
            Some(fields) => Ok(Self { stage, path, fields }),
            None => Err(parse_error(stage, &path, format!("expected object, got {}", kind(value)))),
        }
    }

    pub fn value(&self, field: &str) -> Result<&'a Value, ControllerError> {
        self.get(field)
    }

    pub fn str(&self, field: &str) -> Result<&'a str, ControllerError> {
        let value = self.get(field)?;
        value
            .as_str()
            .ok_or_else(|| self.invalid(field, format!("expected string, got {}", kind(value))))
    }

    pub fn bool(&self, field: &str) -> Result<bool, ControllerError> {
        let value = self.get(field)?;
        value
            .as_bool()
            .ok_or_else(|| self.invalid(field, format!("expected boolean, got {}", kind(value))))
    }

    pub fn f64(&self, field: &str) -> Result<f64, ControllerError> {
        let value = self.get(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.invalid(field, format!("expected number, got {}", kind(value))))
    }

    /// An integral identifier. Whole floating values such as `12.0` are accepted.
    pub fn id(&self, field: &str) -> Result<i64, ControllerError> {
        let number = self.number(field)?;
        if let Some(id) = number.as_i64() {
            return Ok(id);
        }
        match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
            _ => Err(self.invalid(field, format!("expected integer, got {}", number))),
        }
    }

    /// A count delivered as a (possibly scientific-notation) number,
    /// rounded to the nearest integer. With `arbitrary_precision` the
    /// number still holds its response text, so no digits go through f64.
    pub fn count(&self, field: &str) -> Result<i64, ControllerError> {
        let number = self.number(field)?;
        if let Some(n) = number.as_i64() {
            return Ok(n);
        }
        parse_count(&number.to_string())
            .ok_or_else(|| self.invalid(field, format!("{} is not a representable count", number)))
    }

    fn number(&self, field: &str) -> Result<&'a Number, ControllerError> {
        match self.get(field)? {
            Value::Number(n) => Ok(n),
            other => Err(self.invalid(field, format!("expected number, got {}", kind(other)))),
        }
    }

    fn get(&self, field: &str) -> Result<&'a Value, ControllerError> {
        self.fields
            .get(field)
            .ok_or_else(|| self.invalid(field, "missing".to_string()))
    }

    fn invalid(&self, field: &str, reason: String) -> ControllerError {
        parse_error(self.stage, &format!("{}.{}", self.path, field), reason)
    }
}

fn parse_error(stage: Stage, field: &str, reason: String) -> ControllerError {
    ControllerError::Parse {
        stage,
        field: field.to_string(),
        reason,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a decimal number, optionally in scientific notation, into an
/// exact integer rounded half-to-even.
///
/// The digits are handled as text, so no precision is lost to binary
/// floating point. Returns `None` for malformed input or values outside
/// the `i64` range.
pub fn parse_count(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], unsigned[i + 1..].parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    // value = digits * 10^scale
    let all_digits = format!("{}{}", int_part, frac_part);
    let digits = all_digits.trim_start_matches('0');
    let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
    if digits.is_empty() {
        return Some(0);
    }

    let magnitude: i128 = if scale >= 0 {
        if digits.len() as i64 + scale as i64 > 20 {
            return None;
        }
        let base: i128 = digits.parse().ok()?;
        base.checked_mul(10i128.checked_pow(scale as u32)?)?
    } else {
        let frac_len = scale.unsigned_abs() as usize;
        let (whole, frac) = if frac_len >= digits.len() {
            ("", digits)
        } else {
            digits.split_at(digits.len() - frac_len)
        };
        if whole.len() > 20 {
            return None;
        }
        let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        // implicit leading zeros push the first fractional digit below 5
        let leading_zeros = frac_len.saturating_sub(digits.len());
        let round_up = if leading_zeros > 0 {
            false
        } else {
            match frac.as_bytes()[0] {
                b'6'..=b'9' => true,
                b'5' => frac[1..].bytes().any(|b| b != b'0') || whole % 2 == 1,
                _ => false,
            }
        };
        whole + i128::from(round_up)
    };

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count_plain_and_scientific() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("1.234e6"), Some(1_234_000));
        assert_eq!(parse_count("1.234E+6"), Some(1_234_000));
        assert_eq!(parse_count("7.0"), Some(7));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("-3e2"), Some(-300));
        assert_eq!(parse_count("15e-1"), Some(2));
    }

    #[test]
    fn test_parse_count_rounding() {
        assert_eq!(parse_count("2.5"), Some(2));
        assert_eq!(parse_count("3.5"), Some(4));
        assert_eq!(parse_count("2.51"), Some(3));
        assert_eq!(parse_count("2.4999"), Some(2));
        assert_eq!(parse_count("0.5"), Some(0));
        assert_eq!(parse_count("0.05"), Some(0));
        assert_eq!(parse_count("5e-1"), Some(0));
        assert_eq!(parse_count("9.9e-1"), Some(1));
    }

    #[test]
    fn test_parse_count_full_range() {
        assert_eq!(parse_count("9.223372036854775807e18"), Some(i64::MAX));
        assert_eq!(parse_count("1.2345678901234567e16"), Some(12_345_678_901_234_567));
        assert_eq!(parse_count("9.3e18"), None);
        assert_eq!(parse_count("1e400"), None);
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        for bad in ["", "-", "abc", "1.2.3", "1e", "e5", "0x10", "1,000"] {
            assert_eq!(parse_count(bad), None, "{:?}", bad);
        }
    }

    #[test]
    fn test_record_reports_field_path() {
        let value = json!({"name": "shop", "id": "12"});
        let record = Record::new(Stage::Inventory, "[0]".to_string(), &value).unwrap();
        assert_eq!(record.str("name").unwrap(), "shop");

        match record.id("id") {
            Err(ControllerError::Parse { stage, field, .. }) => {
                assert_eq!(stage, Stage::Inventory);
                assert_eq!(field, "[0].id");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(record.bool("enabled").is_err());
    }

    #[test]
    fn test_record_numbers() {
        let value = json!({"id": 12.0, "calls": 1.234e6, "rate": 3, "frac": 1.5});
        let record = Record::new(Stage::SummaryStats, "data[0]".to_string(), &value).unwrap();
        assert_eq!(record.id("id").unwrap(), 12);
        assert_eq!(record.count("calls").unwrap(), 1_234_000);
        assert_eq!(record.f64("rate").unwrap(), 3.0);
        assert!(record.id("frac").is_err());
    }

    #[test]
    fn test_count_from_response_text() {
        let json = parse_body(
            Stage::SummaryStats,
            r#"{"big": 9.223372036854775807e18, "sci": 1.2345678901234567E+16, "half": 2.5, "over": 1e19}"#,
        )
        .unwrap();
        let record = Record::new(Stage::SummaryStats, "data[0]".to_string(), &json).unwrap();
        assert_eq!(record.count("big").unwrap(), i64::MAX);
        assert_eq!(record.count("sci").unwrap(), 12_345_678_901_234_567);
        assert_eq!(record.count("half").unwrap(), 2);
        assert!(record.count("over").is_err());
    }

    #[test]
    fn test_array_and_object_shape() {
        assert!(array(Stage::Inventory, "$", &json!({"a": 1})).is_err());
        assert_eq!(array(Stage::Inventory, "$", &json!([1, 2])).unwrap().len(), 2);
        assert!(Record::new(Stage::Inventory, "[0]".to_string(), &json!(5)).is_err());
    }
}
