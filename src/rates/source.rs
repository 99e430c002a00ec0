use serde_json::Value;

use super::SourceError;

/// Field names a rate may appear under, in lookup order.
pub const DEFAULT_RATE_FIELDS: &[&str] = &["price", "promedio", "rate"];

/// One external provider of the USD -> local rate.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rate. Any failure is reported as a single
    /// [`SourceError`]; a returned value is always finite and positive.
    async fn fetch(&self) -> Result<f64, SourceError>;

    fn name(&self) -> &str;
}

/// Pull the rate out of a provider response.
///
/// The first field in `fields` holding a number (or a string that parses as
/// one) wins. The value must be finite and positive.
pub fn extract_rate<S: AsRef<str>>(body: &Value, fields: &[S]) -> Result<f64, SourceError> {
    let object = body
        .as_object()
        .ok_or_else(|| SourceError::Malformed("expected a JSON object".to_string()))?;

    let value = fields
        .iter()
        .filter_map(|field| object.get(field.as_ref()))
        .find_map(numeric_value)
        .ok_or_else(|| {
            let names: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
            SourceError::MissingField(names.join(", "))
        })?;

    if !value.is_finite() {
        return Err(SourceError::NotFinite);
    }
    if value <= 0.0 {
        return Err(SourceError::NonPositive(value));
    }
    Ok(value)
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_each_known_field() {
        for field in DEFAULT_RATE_FIELDS {
            let mut object = serde_json::Map::new();
            object.insert(field.to_string(), json!(36.12));
            let body = Value::Object(object);
            assert_eq!(extract_rate(&body, DEFAULT_RATE_FIELDS).unwrap(), 36.12);
        }
    }

    #[test]
    fn first_listed_field_wins() {
        let body = json!({ "rate": 40.0, "price": 39.5 });
        assert_eq!(extract_rate(&body, DEFAULT_RATE_FIELDS).unwrap(), 39.5);
    }

    #[test]
    fn skips_non_numeric_field_and_uses_next() {
        let body = json!({ "price": null, "promedio": "37,25" });
        assert_eq!(extract_rate(&body, DEFAULT_RATE_FIELDS).unwrap(), 37.25);
    }

    #[test]
    fn missing_field_is_an_error() {
        let body = json!({ "value": 36.0 });
        assert_eq!(
            extract_rate(&body, DEFAULT_RATE_FIELDS),
            Err(SourceError::MissingField("price, promedio, rate".to_string()))
        );
    }

    #[test]
    fn non_positive_and_non_finite_are_rejected() {
        assert_eq!(
            extract_rate(&json!({ "price": 0 }), DEFAULT_RATE_FIELDS),
            Err(SourceError::NonPositive(0.0))
        );
        assert_eq!(
            extract_rate(&json!({ "price": -2.5 }), DEFAULT_RATE_FIELDS),
            Err(SourceError::NonPositive(-2.5))
        );
        assert_eq!(
            extract_rate(&json!({ "price": "NaN" }), DEFAULT_RATE_FIELDS),
            Err(SourceError::NotFinite)
        );
    }

    #[test]
    fn non_object_body_is_malformed() {
        assert!(matches!(
            extract_rate(&json!([36.0]), DEFAULT_RATE_FIELDS),
            Err(SourceError::Malformed(_))
        ));
    }
}
