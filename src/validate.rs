use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Request bodies check their own field rules before any statement runs.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::validation("at least one item is required"));
        }
        for (i, item) in self.iter().enumerate() {
            item.validate()
                .map_err(|e| ApiError::validation(format!("item {i}: {}", e.public_message())))?;
        }
        Ok(())
    }
}

/// JSON body that has been deserialized and validated.
///
/// Malformed JSON and failed checks both become `400` with the underlying message.
#[derive(Debug)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Payload(value))
    }
}

pub fn non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn positive_id(field: &str, id: i64) -> Result<(), ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Validates the `?name=` search term shared by every search route.
pub fn search_term(name: Option<&str>) -> Result<&str, ApiError> {
    match name.map(str::trim) {
        Some(term) if !term.is_empty() => Ok(term),
        _ => Err(ApiError::validation("Search query is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Validate for Named {
        fn validate(&self) -> Result<(), ApiError> {
            non_empty("name", self.0)
        }
    }

    #[test]
    fn vec_reports_failing_index() {
        let err = vec![Named("salt"), Named(" ")].validate().unwrap_err();
        assert_eq!(err.public_message(), "item 1: name is required");
    }

    #[test]
    fn empty_vec_is_rejected() {
        let items: Vec<Named> = Vec::new();
        assert!(items.validate().is_err());
    }

    #[test]
    fn search_term_rejects_blank() {
        assert!(search_term(None).is_err());
        assert!(search_term(Some("   ")).is_err());
        assert_eq!(search_term(Some(" tomato ")).unwrap(), "tomato");
    }

    #[test]
    fn field_helpers() {
        assert!(positive_id("tool_id", 0).is_err());
        assert!(positive_id("tool_id", 7).is_ok());
        assert!(max_chars("name", "abc", 2).is_err());
        assert!(max_chars("name", "ab", 2).is_ok());
    }
}
