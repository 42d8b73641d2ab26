use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::validate::{positive_id, Validate};

fn check_quantity(quantity: i32) -> Result<(), ApiError> {
    if quantity < 1 {
        return Err(ApiError::validation("quantity must be at least 1"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: i64,
    pub quantity: i32,
}

impl Validate for AddToCart {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("product_id", self.product_id)?;
        check_quantity(self.quantity)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

impl Validate for UpdateQuantity {
    fn validate(&self) -> Result<(), ApiError> {
        check_quantity(self.quantity)
    }
}

#[derive(Debug, Serialize)]
pub struct CartMessage {
    pub message: &'static str,
}
