//! Claims carried by a verified credential.

use serde::Deserialize;
use serde_json::Value;

/// Decoded claims of a bearer credential.
///
/// `isPaid` is kept as a raw JSON value: only the boolean `true` grants
/// entitlement, anything else (absent, `false`, `"true"`, `1`) does not.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, rename = "isPaid")]
    pub is_paid: Option<Value>,

    #[serde(default)]
    pub iat: Option<u64>,

    pub exp: u64,
}

impl Claims {
    pub fn is_entitled(&self) -> bool {
        matches!(self.is_paid, Some(Value::Bool(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(payload: Value) -> Claims {
        serde_json::from_value(payload).expect("claims should deserialize")
    }

    #[test]
    fn only_boolean_true_is_entitled() {
        assert!(claims(json!({"exp": 1, "isPaid": true})).is_entitled());
        assert!(!claims(json!({"exp": 1, "isPaid": false})).is_entitled());
        assert!(!claims(json!({"exp": 1, "isPaid": "true"})).is_entitled());
        assert!(!claims(json!({"exp": 1, "isPaid": 1})).is_entitled());
        assert!(!claims(json!({"exp": 1, "isPaid": null})).is_entitled());
        assert!(!claims(json!({"exp": 1})).is_entitled());
    }

    #[test]
    fn identity_fields_are_optional() {
        let c = claims(json!({"exp": 42, "sub": "u-1", "email": "a@b.c", "iat": 40}));
        assert_eq!(c.sub.as_deref(), Some("u-1"));
        assert_eq!(c.email.as_deref(), Some("a@b.c"));
        assert_eq!(c.iat, Some(40));
        assert_eq!(c.exp, 42);
    }

    #[test]
    fn exp_is_required() {
        assert!(serde_json::from_value::<Claims>(json!({"isPaid": true})).is_err());
    }
}
