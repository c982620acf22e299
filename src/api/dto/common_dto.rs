//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::MinorUnits;
use crate::error::GatewayError;

/// Outcome of an idempotent transition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangedResponse {
    /// `false` when the target was already in a terminal state.
    pub changed: bool,
}

/// Number of rows affected by a bulk operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountResponse {
    /// Rows affected.
    pub count: u64,
}

/// Converts an optional decimal major-unit amount from a client.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for NaN, negative or
/// out-of-range amounts.
pub fn parse_amount(major: Option<f64>) -> Result<MinorUnits, GatewayError> {
    major.map_or(Ok(MinorUnits::ZERO), |value| {
        MinorUnits::from_major(value)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid amount: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_convert_to_minor_units() {
        assert!(matches!(parse_amount(None), Ok(MinorUnits::ZERO)));
        assert!(matches!(parse_amount(Some(5.0)), Ok(m) if m == MinorUnits::new(500)));
        assert!(matches!(parse_amount(Some(0.5)), Ok(m) if m == MinorUnits::new(50)));
        assert!(matches!(
            parse_amount(Some(-1.0)),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_amount(Some(f64::NAN)),
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
