use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JWT payload issued by the account service.
///
/// `user_id` is kept as a raw JSON value: issuers encode it either as an integer
/// or as a float such as `42.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    /// Numeric subject, if the claim holds a whole positive number.
    pub fn subject(&self) -> Option<i64> {
        match &self.user_id {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
        .filter(|id| *id > 0)
    }
}
