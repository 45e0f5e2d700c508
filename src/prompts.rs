//! The extraction prompt sent alongside every receipt image.
//!
//! Kept in one place so the schema the model is asked for and the schema
//! [`crate::pipeline::deserialize`] accepts can be checked side by side.
//! Callers can override it via [`crate::config::ExtractorConfig::prompt`].

/// Default prompt asking the model for a single JSON bill object.
pub const EXTRACTION_PROMPT: &str = r#"Extract the following fields from this bill image and return them in JSON format. The structure must match this example:
{
  "vendor": "string",
  "date": "yyyy-MM-ddTHH:mm:ssZ",
  "totalAmount": number,
  "paymentMethod": "string or null",
  "lineItems": [
    {
      "itemName": "string",
      "quantity": number,
      "unitPrice": number,
      "totalPrice": number
    }
  ]
}

Fields to extract:
- vendor: The name of the vendor or store.
- date: The date on the bill in ISO 8601 UTC format (yyyy-MM-ddTHH:mm:ssZ). If the time is missing, use 00:00:00. If the timezone is missing, assume UTC.
- totalAmount: The final total amount due (numeric, e.g. 500.00).
- paymentMethod: The payment method used (e.g. Credit Card, Cash). If not found, use null.
- lineItems: An array of items, each with itemName, quantity, unitPrice and totalPrice. If line items are not clearly separable or present, return an empty array [].

If a top-level field (vendor, date, totalAmount) cannot be reliably extracted, return null for that field (except lineItems, which must be []).
Return ONLY the JSON object, without any surrounding text, comments, or markdown formatting like ```json ... ```."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_wire_field() {
        for field in [
            "vendor",
            "date",
            "totalAmount",
            "paymentMethod",
            "lineItems",
            "itemName",
            "quantity",
            "unitPrice",
            "totalPrice",
        ] {
            assert!(
                EXTRACTION_PROMPT.contains(&format!("\"{field}\"")),
                "prompt is missing {field}"
            );
        }
    }
}
