//! Bill deserialisation and field validation.
//!
//! Model text is first parsed into a [`BillDraft`], where every field is
//! optional and `null` is as good as absent. Only a draft with a vendor and
//! a strictly positive total becomes a [`Bill`]. A zero total means the
//! model failed to read the receipt; it is not a free purchase.

use crate::bill::{
    deserialize_date, deserialize_id, deserialize_line_items, deserialize_opt_money,
    deserialize_text, Bill, LineItem,
};
use crate::error::BillScanError;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

/// A bill as the model reported it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDraft {
    #[serde(default, alias = "_id", deserialize_with = "deserialize_id")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub vendor: Option<String>,

    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "deserialize_opt_money")]
    pub total_amount: Option<BigDecimal>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub payment_method: Option<String>,

    #[serde(default, deserialize_with = "deserialize_line_items")]
    pub line_items: Vec<LineItem>,
}

/// Parse normalised model text into a draft.
///
/// Malformed JSON (or a value of the wrong shape) fails with
/// `Deserialization`, keeping the offending text on the error for logs.
pub fn parse_bill_draft(json: &str) -> Result<BillDraft, BillScanError> {
    serde_json::from_str(json).map_err(|source| {
        warn!("JSON deserialization error: {}. Text: {}", source, json);
        BillScanError::Deserialization {
            source,
            text: json.to_string(),
        }
    })
}

/// Check the gating fields and turn a draft into a bill.
///
/// Rejects a missing/blank vendor or a total that is missing or `<= 0`.
/// A caller-supplied id is kept; otherwise a fresh one is generated.
pub fn validate_draft(draft: BillDraft) -> Result<Bill, BillScanError> {
    let mut problems = Vec::new();

    if draft.vendor.is_none() {
        problems.push("vendor is missing".to_string());
    }
    match &draft.total_amount {
        None => problems.push("total amount is missing".to_string()),
        Some(total) if *total <= BigDecimal::zero() => {
            problems.push(format!("total amount must be greater than zero (got {total})"))
        }
        Some(_) => {}
    }

    let (Some(vendor), Some(total_amount), true) =
        (draft.vendor, draft.total_amount, problems.is_empty())
    else {
        return Err(BillScanError::validation(format!(
            "Extracted bill is incomplete: {}",
            problems.join("; ")
        )));
    };

    let id = draft.id.unwrap_or_else(new_bill_id);
    debug!("Validated bill {} from '{}'", id, vendor);

    Ok(Bill {
        id,
        vendor,
        date: draft.date,
        total_amount,
        payment_method: draft.payment_method,
        line_items: draft.line_items,
    })
}

/// Parse and validate in one step.
pub fn parse_bill(json: &str) -> Result<Bill, BillScanError> {
    validate_draft(parse_bill_draft(json)?)
}

/// Generate a new bill identifier: a v4 UUID as 32 lowercase hex digits.
pub fn new_bill_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
