use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;
use crate::validate::{max_chars, non_empty, positive_id, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Amount of an ingredient or tool used by a recipe.
///
/// Accepts `{"amount": 2, "unit": "cup"}` or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(from = "QuantityInput")]
pub struct Quantity {
    pub amount: f64,
    pub unit: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuantityInput {
    Bare(f64),
    Full {
        amount: f64,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl From<QuantityInput> for Quantity {
    fn from(input: QuantityInput) -> Self {
        match input {
            QuantityInput::Bare(amount) => Quantity { amount, unit: None },
            QuantityInput::Full { amount, unit } => Quantity {
                amount,
                unit: unit.filter(|u| !u.trim().is_empty()),
            },
        }
    }
}

impl Validate for Quantity {
    fn validate(&self) -> Result<(), ApiError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ApiError::validation("quantity must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub category: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl Validate for RecipeData {
    fn validate(&self) -> Result<(), ApiError> {
        non_empty("name", &self.name)?;
        max_chars("name", &self.name, 255)?;
        non_empty("category", &self.category)?;
        if self.prep_time < 0 || self.cook_time < 0 {
            return Err(ApiError::validation("prep_time and cook_time must not be negative"));
        }
        if self.servings < 1 {
            return Err(ApiError::validation("servings must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientInput {
    pub ingredient_id: i64,
    pub quantity: Quantity,
}

impl Validate for RecipeIngredientInput {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("ingredient_id", self.ingredient_id)?;
        self.quantity.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeToolInput {
    pub tool_id: i64,
    pub quantity: Quantity,
}

impl Validate for RecipeToolInput {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("tool_id", self.tool_id)?;
        self.quantity.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepInput {
    pub step_number: i32,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Validate for StepInput {
    fn validate(&self) -> Result<(), ApiError> {
        if self.step_number < 1 {
            return Err(ApiError::validation("step_number must be at least 1"));
        }
        non_empty("title", &self.title)
    }
}

/// Body of recipe create and replace.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRequest {
    #[serde(rename = "recipeData")]
    pub recipe: RecipeData,
    #[serde(rename = "recipeIngredientData", default)]
    pub ingredients: Vec<RecipeIngredientInput>,
    #[serde(rename = "recipeToolData", default)]
    pub tools: Vec<RecipeToolInput>,
    #[serde(rename = "stepsData", default)]
    pub steps: Vec<StepInput>,
}

fn each<T: Validate>(section: &str, items: &[T]) -> Result<(), ApiError> {
    for (i, item) in items.iter().enumerate() {
        item.validate().map_err(|e| {
            ApiError::validation(format!("{section}[{i}]: {}", e.public_message()))
        })?;
    }
    Ok(())
}

impl Validate for RecipeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        self.recipe.validate()?;
        each("recipeIngredientData", &self.ingredients)?;
        each("recipeToolData", &self.tools)?;
        each("stepsData", &self.steps)?;

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step_number) {
                return Err(ApiError::validation(format!(
                    "duplicate step_number {}",
                    step.step_number
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeWriteResponse {
    pub recipe_id: i64,
    pub message: &'static str,
    /// False when the search index has not caught up yet.
    pub indexed: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
    pub indexed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangeOwnerRequest {
    pub recipe_id: i64,
    pub new_owner_id: i64,
}

impl Validate for ChangeOwnerRequest {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("recipe_id", self.recipe_id)?;
        positive_id("new_owner_id", self.new_owner_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub recipe_id: i64,
    pub is_public: bool,
}

impl Validate for ChangeStatusRequest {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("recipe_id", self.recipe_id)
    }
}

pub type StepEdit = StepInput;
pub type IngredientEdit = RecipeIngredientInput;
pub type ToolEdit = RecipeToolInput;

#[derive(Debug, Deserialize)]
pub struct IngredientSearchRequest {
    #[serde(default)]
    pub ingredients: Vec<i64>,
}

impl Validate for IngredientSearchRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.ingredients.is_empty() {
            return Err(ApiError::validation("At least one ingredient ID is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    /// `(limit, offset)` clamped into range.
    pub fn window(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
