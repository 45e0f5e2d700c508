//! The persisted expense record and its wire format.
//!
//! A [`Bill`] is only ever constructed by the deserializer stage after field
//! validation, or read back from a store. Its JSON form uses camelCase keys
//! so a stored document and a model response share one vocabulary.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

/// Fixed output format for bill dates.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single receipt, validated and ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    /// Opaque identifier; never changes once assigned.
    #[serde(alias = "_id")]
    pub id: String,

    /// Vendor or store name. Never empty.
    pub vendor: String,

    /// Purchase date in UTC (midnight when the receipt shows no time).
    #[serde(
        default,
        serialize_with = "serialize_date",
        deserialize_with = "deserialize_date"
    )]
    pub date: Option<DateTime<Utc>>,

    /// Final amount due. Always strictly positive.
    #[serde(deserialize_with = "deserialize_money")]
    pub total_amount: BigDecimal,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub payment_method: Option<String>,

    #[serde(default, deserialize_with = "deserialize_line_items")]
    pub line_items: Vec<LineItem>,
}

/// One row of a receipt, trusted as reported.
///
/// `total_price` is not checked against `quantity × unit_price`; receipts
/// carry discounts and rounding the model cannot see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "deserialize_item_name")]
    pub item_name: String,

    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantity: f64,

    #[serde(default = "BigDecimal::zero", deserialize_with = "deserialize_money_or_zero")]
    pub unit_price: BigDecimal,

    #[serde(default = "BigDecimal::zero", deserialize_with = "deserialize_money_or_zero")]
    pub total_price: BigDecimal,
}

impl Bill {
    /// Sum of the line items' reported totals.
    pub fn line_items_total(&self) -> BigDecimal {
        self.line_items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + &item.total_price)
    }
}

// ── Field parsers ────────────────────────────────────────────────────────────

/// Parse a date the way models tend to write them.
///
/// Accepts RFC 3339 with any offset, naive date-times (assumed UTC) and bare
/// dates (midnight UTC). Returns `None` for anything else.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Longest amount text accepted, sign and decimal point included.
const MAX_AMOUNT_CHARS: usize = 32;
/// Largest decimal exponent, either way, an amount may carry.
const MAX_AMOUNT_SCALE: i64 = 18;

/// Convert a JSON number or numeric string into an exact decimal.
///
/// Numbers go through their shortest text form, so `12.34` stays `12.34`
/// instead of picking up binary floating-point noise.
fn money_from_value(value: Value) -> Result<Option<BigDecimal>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => parse_amount(&n.to_string()).map(Some),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_amount(s.trim()).map(Some),
        other => Err(format!("expected an amount, found {other}")),
    }
}

/// Parse amount text, refusing values whose plain rendering would be huge.
///
/// `1e100000000` is eleven characters but prints as a hundred million
/// digits, so both the text length and the exponent are bounded.
fn parse_amount(text: &str) -> Result<BigDecimal, String> {
    if text.len() > MAX_AMOUNT_CHARS {
        return Err(format!(
            "amount is longer than {MAX_AMOUNT_CHARS} characters"
        ));
    }
    let amount = BigDecimal::from_str(text).map_err(|_| format!("invalid amount \"{text}\""))?;
    let (_, scale) = amount.as_bigint_and_exponent();
    if scale.abs() > MAX_AMOUNT_SCALE {
        return Err(format!("amount \"{text}\" is out of range"));
    }
    Ok(amount)
}

pub(crate) fn deserialize_opt_money<'de, D>(d: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    money_from_value(value).map_err(D::Error::custom)
}

fn deserialize_money<'de, D>(d: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_opt_money(d)?.ok_or_else(|| D::Error::custom("amount is required"))
}

fn deserialize_money_or_zero<'de, D>(d: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_money(d)?.unwrap_or_else(BigDecimal::zero))
}

fn deserialize_quantity<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(d)?.unwrap_or(Value::Null) {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("invalid quantity {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid quantity \"{s}\""))),
        other => Err(D::Error::custom(format!(
            "expected a quantity, found {other}"
        ))),
    }
}

pub(crate) fn deserialize_date<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognised date \"{s}\""))),
    }
}

fn serialize_date<S>(date: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(dt) => s.serialize_str(&dt.format(DATE_FORMAT).to_string()),
        None => s.serialize_none(),
    }
}

/// Optional free text; blank strings count as absent.
pub(crate) fn deserialize_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// A caller-supplied identifier: blank means absent, anything else is kept
/// byte for byte.
pub(crate) fn deserialize_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.trim().is_empty()))
}

fn deserialize_item_name<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_text(d)?.unwrap_or_default())
}

/// `null` line items mean "none found", not an error.
pub(crate) fn deserialize_line_items<'de, D>(d: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn oversized_amounts_are_refused() {
        for amount in [
            r#""1e100000000""#,
            r#""1E-100000000""#,
            "1e300",
            r#""123456789012345678901234567890123""#,
        ] {
            let json = format!(r#"{{"id":"x","vendor":"V","totalAmount":{amount}}}"#);
            let err = serde_json::from_str::<Bill>(&json).unwrap_err();
            assert!(err.to_string().contains("amount"), "{amount}: {err}");
        }
    }

    #[test]
    fn moderate_exponents_still_parse() {
        let bill: Bill =
            serde_json::from_str(r#"{"id":"x","vendor":"V","totalAmount":"1.5e3"}"#).unwrap();
        assert_eq!(bill.total_amount, dec("1500"));
        assert_eq!(serde_json::to_value(&bill).unwrap()["totalAmount"], "1500");
    }

    #[test]
    fn parse_date_variants() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-01-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_date("2024-01-01"), Some(midnight));
        assert_eq!(parse_date(" 2024-01-01T00:00:00 "), Some(midnight));
        assert_eq!(parse_date("2024-01-01 00:00:00"), Some(midnight));
        assert_eq!(parse_date("2024-01-01T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_date("01/02/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn money_keeps_decimal_text() {
        let item: LineItem =
            serde_json::from_str(r#"{"itemName":"Tea","quantity":1,"unitPrice":12.34,"totalPrice":"12.34"}"#)
                .unwrap();
        assert_eq!(item.unit_price.to_string(), "12.34");
        assert_eq!(item.total_price, dec("12.34"));
    }

    #[test]
    fn line_item_nulls_become_empty_values() {
        let item: LineItem =
            serde_json::from_str(r#"{"itemName":null,"quantity":null,"unitPrice":null}"#).unwrap();
        assert_eq!(item.item_name, "");
        assert_eq!(item.quantity, 0.0);
        assert!(item.unit_price.is_zero());
        assert!(item.total_price.is_zero());
    }

    #[test]
    fn fractional_quantity_is_kept() {
        let item: LineItem = serde_json::from_str(r#"{"quantity":"0.75"}"#).unwrap();
        assert_eq!(item.quantity, 0.75);
    }

    #[test]
    fn bill_serialises_camel_case_with_fixed_date() {
        let bill = Bill {
            id: "abc".into(),
            vendor: "Cafe X".into(),
            date: parse_date("2024-03-05T10:11:12.345+00:00"),
            total_amount: dec("12.5"),
            payment_method: None,
            line_items: vec![],
        };
        let json = serde_json::to_value(&bill).unwrap();
        assert_eq!(json["date"], "2024-03-05T10:11:12Z");
        assert_eq!(json["totalAmount"], "12.5");
        assert!(json["paymentMethod"].is_null());
        assert!(json["lineItems"].as_array().unwrap().is_empty());

        let back: Bill = serde_json::from_value(json).unwrap();
        assert_eq!(back.vendor, "Cafe X");
        assert_eq!(back.total_amount, dec("12.5"));
    }

    #[test]
    fn bill_accepts_underscore_id() {
        let bill: Bill =
            serde_json::from_str(r#"{"_id":"x1","vendor":"V","totalAmount":3}"#).unwrap();
        assert_eq!(bill.id, "x1");
        assert!(bill.date.is_none());
    }

    #[test]
    fn line_items_total_sums_reported_totals() {
        let bill: Bill = serde_json::from_str(
            r#"{"id":"x","vendor":"V","totalAmount":5,
                "lineItems":[{"totalPrice":1.10},{"totalPrice":"2.20"}]}"#,
        )
        .unwrap();
        assert_eq!(bill.line_items_total(), dec("3.30"));
    }
}
