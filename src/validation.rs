//! Input validation for service requests.
//!
//! Lengths are counted in characters, not bytes.

use crate::error::{LifekitError, Result};
use crate::models::PaymentRequest;

pub const MAX_TEXT_CHARS: usize = 1000;
pub const MAX_NOTES_CHARS: usize = 5000;
pub const MAX_INGREDIENTS: usize = 20;
pub const MAX_INGREDIENT_CHARS: usize = 100;

pub const DEFAULT_CURRENCY: &str = "KES";
pub const DEFAULT_DESCRIPTION: &str = "SDG Support Payment";

/// A payment request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPayment {
    pub amount: f64,
    pub email: String,
    pub currency: String,
    pub description: String,
}

impl ValidPayment {
    /// Amount in minor units (cents), truncated.
    pub fn amount_minor(&self) -> i64 {
        (self.amount * 100.0).trunc() as i64
    }
}

fn invalid(message: &str) -> LifekitError {
    LifekitError::Validation(message.to_string())
}

fn trimmed_within(
    raw: Option<&str>,
    max_chars: usize,
    missing: &str,
    too_long: &str,
) -> Result<String> {
    let value = raw.unwrap_or_default().trim();
    if value.is_empty() {
        return Err(invalid(missing));
    }
    if value.chars().count() > max_chars {
        return Err(invalid(too_long));
    }
    Ok(value.to_string())
}

/// Journal text: trimmed, non-empty, at most 1000 characters.
pub fn journal_text(raw: Option<&str>) -> Result<String> {
    trimmed_within(raw, MAX_TEXT_CHARS, "text is required", "text too long")
}

/// Study notes: trimmed, non-empty, at most 5000 characters.
pub fn notes(raw: Option<&str>) -> Result<String> {
    trimmed_within(raw, MAX_NOTES_CHARS, "notes is required", "notes too long")
}

/// Ingredient list: 1 to 20 non-blank entries of at most 100 characters.
///
/// Entries are kept as given; only blankness is judged after trimming.
pub fn ingredients(list: &[String]) -> Result<()> {
    if list.is_empty() {
        return Err(invalid("ingredients[] required"));
    }
    if list.len() > MAX_INGREDIENTS {
        return Err(invalid("too many ingredients"));
    }

    for ingredient in list {
        if ingredient.trim().is_empty() {
            return Err(invalid("invalid ingredient"));
        }
        if ingredient.chars().count() > MAX_INGREDIENT_CHARS {
            return Err(invalid("ingredient too long"));
        }
    }

    Ok(())
}

/// Payment request: positive amount and an email, with currency and
/// description defaults filled in.
pub fn payment(request: &PaymentRequest) -> Result<ValidPayment> {
    let amount = match request.amount {
        Some(amount) if amount.is_finite() && amount > 0.0 => amount,
        _ => return Err(invalid("Valid amount is required")),
    };

    let email = match request.email.as_deref() {
        Some(email) if !email.is_empty() => email.to_string(),
        _ => return Err(invalid("Email is required")),
    };

    Ok(ValidPayment {
        amount,
        email,
        currency: request
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        description: request
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
    })
}
