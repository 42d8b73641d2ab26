use serde::{Deserialize, Serialize};

use super::CatalogKind;
use crate::error::ApiError;
use crate::validate::{max_chars, non_empty, Validate};

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItemInput {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl Validate for CatalogItemInput {
    fn validate(&self) -> Result<(), ApiError> {
        non_empty("name", &self.name)?;
        max_chars("name", &self.name, 255)?;
        non_empty("category", &self.category)
    }
}

impl CatalogItemInput {
    /// Rules that depend on which catalog the item goes into.
    pub fn validate_for(&self, kind: CatalogKind) -> Result<(), ApiError> {
        if kind.requires_unit() && self.unit.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ApiError::validation("unit is required"));
        }
        Ok(())
    }
}

pub fn validate_batch(kind: CatalogKind, items: &[CatalogItemInput]) -> Result<(), ApiError> {
    for (i, item) in items.iter().enumerate() {
        item.validate_for(kind)
            .map_err(|e| ApiError::validation(format!("item {i}: {}", e.public_message())))?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
    pub indexed: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkCreatedResponse {
    pub message: String,
    pub ids: Vec<i64>,
    pub indexed: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub message: String,
    pub indexed: bool,
}
