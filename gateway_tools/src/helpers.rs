use sps_common::Money;

use crate::GatewayApiError;

/// Minor-unit exponents for the currencies the storefront trades in.
///
/// The exponent is looked up from the explicit currency code on the order — never derived from the size of an amount.
/// Unknown codes are rejected rather than defaulted.
const CURRENCY_EXPONENTS: &[(&str, u32)] = &[
    ("AUD", 2),
    ("CAD", 2),
    ("CHF", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("INR", 2),
    ("JPY", 0),
    ("KRW", 0),
    ("KWD", 3),
    ("SGD", 2),
    ("USD", 2),
    ("ZAR", 2),
];

pub fn currency_exponent(currency: &str) -> Result<u32, GatewayApiError> {
    CURRENCY_EXPONENTS
        .iter()
        .find(|(code, _)| *code == currency)
        .map(|(_, exp)| *exp)
        .ok_or_else(|| GatewayApiError::UnsupportedCurrency(currency.to_string()))
}

/// The provider expresses amounts as decimal strings ("499.00"). Convert one into integer minor units for the given
/// currency. Excess precision is an error, not a rounding opportunity.
pub fn parse_gateway_amount(amount: &str, currency: &str) -> Result<Money, GatewayApiError> {
    let exponent = currency_exponent(currency)?;
    let invalid = || GatewayApiError::InvalidCurrencyAmount(format!("{amount} {currency}"));
    let (negative, amount) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().ok_or_else(invalid)?;
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole = whole.parse::<i64>().map_err(|_| invalid())?;
    let frac_str = parts.next().unwrap_or("");
    if frac_str.len() > exponent as usize || !frac_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let mut frac = if frac_str.is_empty() { 0 } else { frac_str.parse::<i64>().map_err(|_| invalid())? };
    // Pad "4.5" in a 2-exponent currency out to 450 minor units
    frac *= 10i64.pow(exponent - frac_str.len() as u32);
    let scale = 10i64.pow(exponent);
    let minor = whole.checked_mul(scale).and_then(|w| w.checked_add(frac)).ok_or_else(invalid)?;
    let minor = if negative { -minor } else { minor };
    Ok(Money::from(minor))
}

/// Render integer minor units as the decimal string the provider expects for the given currency.
pub fn format_gateway_amount(amount: Money, currency: &str) -> Result<String, GatewayApiError> {
    let exponent = currency_exponent(currency)?;
    let value = amount.value();
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    if exponent == 0 {
        return Ok(format!("{sign}{magnitude}"));
    }
    let scale = 10u64.pow(exponent);
    Ok(format!("{sign}{}.{:0width$}", magnitude / scale, magnitude % scale, width = exponent as usize))
}
