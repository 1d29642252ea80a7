//! Paid-access gate.

use crate::{errors::Denial, models::claims::Claims};

/// Admit only credentials whose `isPaid` claim is the boolean `true`.
pub fn check(claims: &Claims) -> Result<(), Denial> {
    if claims.is_entitled() {
        Ok(())
    } else {
        Err(Denial::InsufficientEntitlement)
    }
}
