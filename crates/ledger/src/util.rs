//! Internal helpers for parsing and validation.
//!
//! These utilities are **not** part of the public API. They centralize
//! input parsing so money, percentages and ids are validated the same way
//! everywhere.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parses a decimal string with at most two fraction digits into hundredths.
///
/// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
/// `label` names the value in error messages.
pub(crate) fn parse_hundredths(s: &str, label: &str) -> ResultEngine<i64> {
    let empty = || EngineError::InvalidAmount(format!("empty {label}"));
    let invalid = || EngineError::InvalidAmount(format!("invalid {label}"));
    let overflow = || EngineError::InvalidAmount(format!("{label} too large"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let units_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next();

    if parts.next().is_some() {
        return Err(invalid());
    }

    if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let units: i64 = units_str.parse().map_err(|_| invalid())?;

    let hundredths: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => frac.parse::<i64>().map_err(|_| invalid())?,
                _ => {
                    return Err(EngineError::InvalidAmount(format!(
                        "too many decimals in {label}"
                    )));
                }
            }
        }
    };

    let total = units
        .checked_mul(100)
        .and_then(|v| v.checked_add(hundredths))
        .ok_or_else(overflow)?;

    if negative {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

/// Parse a UUID from storage or user input and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hundredths() {
        assert_eq!(parse_hundredths("10", "amount").unwrap(), 1000);
        assert_eq!(parse_hundredths("10,5", "amount").unwrap(), 1050);
        assert_eq!(parse_hundredths("-0.01", "amount").unwrap(), -1);
        assert_eq!(parse_hundredths(" +2.30 ", "amount").unwrap(), 230);
        assert_eq!(parse_hundredths("7.", "amount").unwrap(), 700);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            parse_hundredths("", "amount"),
            Err(EngineError::InvalidAmount("empty amount".to_string()))
        );
        assert_eq!(
            parse_hundredths("1.2.3", "percentage"),
            Err(EngineError::InvalidAmount("invalid percentage".to_string()))
        );
        assert_eq!(
            parse_hundredths("0.001", "amount"),
            Err(EngineError::InvalidAmount(
                "too many decimals in amount".to_string()
            ))
        );
        assert!(parse_hundredths("abc", "amount").is_err());
        assert!(parse_hundredths(".5", "amount").is_err());
    }
}
