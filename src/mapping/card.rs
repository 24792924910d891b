use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::{AppError, Result};

/// Minimal card attribute set every backend mapper must accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cvc: String,
}

impl CardDetails {
    pub fn new(
        number: impl Into<String>,
        exp_month: u32,
        exp_year: u32,
        cvc: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            exp_month,
            exp_year,
            cvc: cvc.into(),
        }
    }

    /// Parse a caller-supplied attribute bag. All four canonical fields
    /// (number, exp_month, exp_year, cvc) are required.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::validation(format!("Invalid card details: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.number.is_empty() || !self.number.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("Card number must be numeric"));
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(AppError::validation(format!(
                "Card exp_month must be between 1 and 12, got {}",
                self.exp_month
            )));
        }
        if self.exp_year < 2000 {
            return Err(AppError::validation(format!(
                "Card exp_year must be a four-digit year, got {}",
                self.exp_year
            )));
        }
        if self.cvc.is_empty() || !self.cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("Card cvc must be numeric"));
        }
        Ok(())
    }
}

/// Rename the canonical card fields into Braintree's vault shape:
/// number -> number, exp_month -> month, exp_year -> year,
/// cvc -> verification_value.
pub fn to_braintree_card(card: &CardDetails) -> Result<Value> {
    card.validate()?;
    Ok(json!({
        "number": card.number,
        "month": card.exp_month,
        "year": card.exp_year,
        "verification_value": card.cvc,
    }))
}

/// Flatten the canonical card fields into the `card[...]` form pairs
/// Stripe's token endpoint expects.
pub fn to_stripe_card(card: &CardDetails) -> Result<Vec<(String, String)>> {
    card.validate()?;
    Ok(vec![
        ("card[number]".to_string(), card.number.clone()),
        ("card[exp_month]".to_string(), card.exp_month.to_string()),
        ("card[exp_year]".to_string(), card.exp_year.to_string()),
        ("card[cvc]".to_string(), card.cvc.clone()),
    ])
}
