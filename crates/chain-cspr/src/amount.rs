//! Decimal <-> base-unit amount conversion.
//!
//! CSPR amounts on-chain are integer motes (1 CSPR = 10^9 motes). User input
//! arrives as a decimal string, so conversion is done on the digit sequence
//! itself and never goes through floating point. Integer parts of any length
//! are supported.

use crate::error::CsprError;

/// Number of fractional digits in one CSPR (motes per CSPR = 10^9).
pub const CSPR_DECIMALS: usize = 9;

/// Convert a decimal amount string into an integer base-unit string.
///
/// The input (after trimming surrounding whitespace) must be one or more ASCII
/// digits, optionally followed by `.` and at most `decimals` digits. Signs,
/// exponents and grouping separators are rejected.
///
/// The result has no leading zeros; an all-zero amount collapses to `"0"`.
/// Whether `"0"` is acceptable is left to the caller.
pub fn to_base_units(amount: &str, decimals: usize) -> Result<String, CsprError> {
    let trimmed = amount.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CsprError::InvalidAmountFormat(format!(
            "expected a non-negative decimal number, got {amount:?}"
        )));
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CsprError::InvalidAmountFormat(format!(
            "fractional part must be digits, got {amount:?}"
        )));
    }
    if frac_part.len() > decimals {
        return Err(CsprError::InvalidAmountFormat(format!(
            "at most {decimals} fractional digits allowed, got {}",
            frac_part.len()
        )));
    }

    let mut combined = String::with_capacity(int_part.len() + decimals);
    combined.push_str(int_part);
    combined.push_str(frac_part);
    combined.extend(std::iter::repeat('0').take(decimals - frac_part.len()));

    let stripped = combined.trim_start_matches('0');
    if stripped.is_empty() {
        Ok("0".to_string())
    } else {
        Ok(stripped.to_string())
    }
}

/// Convert a CSPR decimal string into motes.
pub fn cspr_to_motes(amount: &str) -> Result<String, CsprError> {
    to_base_units(amount, CSPR_DECIMALS)
}

/// Render an integer base-unit string as a decimal amount.
///
/// Trailing fractional zeros are dropped, as is the decimal point when
/// nothing remains after it.
pub fn from_base_units(base_units: &str, decimals: usize) -> Result<String, CsprError> {
    let trimmed = base_units.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CsprError::InvalidAmountFormat(format!(
            "expected an unsigned integer, got {base_units:?}"
        )));
    }

    let digits = trimmed.trim_start_matches('0');
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits.to_string()
    };

    let split = padded.len() - decimals;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        Ok(int_part.to_string())
    } else {
        Ok(format!("{int_part}.{frac_part}"))
    }
}

/// Convert motes into a CSPR decimal string.
pub fn motes_to_cspr(motes: &str) -> Result<String, CsprError> {
    from_base_units(motes, CSPR_DECIMALS)
}
