//! Parameter validation for path and query values.

use crate::error::{GatewayError, Result};

/// Parses `raw` as a base-10 integer strictly greater than `min`.
///
/// Signs, whitespace, decimals and exponents are rejected.
pub fn validate_number_parameter(raw: &str, min: i64) -> Result<i64> {
    let valid_digits = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
    let value = valid_digits
        .then(|| raw.parse::<i64>().ok())
        .flatten()
        .ok_or_else(|| GatewayError::InvalidParameter(format!("'{}' is not a number", raw)))?;

    if value > min {
        Ok(value)
    } else {
        Err(GatewayError::InvalidParameter(format!(
            "{} must be greater than {}",
            value, min
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_accepts_values_above_min() {
        assert_eq!(assert_ok!(validate_number_parameter("1", 0)), 1);
        assert_eq!(assert_ok!(validate_number_parameter("4521", 0)), 4521);
        assert_eq!(assert_ok!(validate_number_parameter("007", 0)), 7);
    }

    #[test]
    fn test_rejects_boundary_and_below() {
        assert_err!(validate_number_parameter("0", 0));
        assert_err!(validate_number_parameter("5", 5));
    }

    #[test]
    fn test_rejects_non_integers() {
        for raw in ["", "abc", "1.5", "-3", "+3", " 3", "1e3", "99999999999999999999"] {
            assert!(
                matches!(
                    validate_number_parameter(raw, 0),
                    Err(GatewayError::InvalidParameter(_))
                ),
                "{raw:?} should be rejected"
            );
        }
    }
}
