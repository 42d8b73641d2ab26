use serde::Deserialize;

use crate::error::ApiError;
use crate::validate::{max_chars, non_empty, Validate};

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl Validate for CategoryInput {
    fn validate(&self) -> Result<(), ApiError> {
        non_empty("name", &self.name)?;
        max_chars("name", &self.name, 255)?;
        if matches!(self.parent_id, Some(id) if id <= 0) {
            return Err(ApiError::validation("parent_id must be a valid category id"));
        }
        Ok(())
    }
}
