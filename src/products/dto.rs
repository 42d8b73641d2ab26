use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::validate::{max_chars, non_empty, Validate};

/// What a product sells. Exactly one backing entity per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Recipe(i64),
    Tool(i64),
    Ingredient(i64),
}

impl Backing {
    pub fn column(self) -> &'static str {
        match self {
            Backing::Recipe(_) => "recipe_id",
            Backing::Tool(_) => "tool_id",
            Backing::Ingredient(_) => "ingredient_id",
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Backing::Recipe(id) | Backing::Tool(id) | Backing::Ingredient(id) => id,
        }
    }

    /// `(recipe_id, tool_id, ingredient_id)` as stored.
    pub fn columns(self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match self {
            Backing::Recipe(id) => (Some(id), None, None),
            Backing::Tool(id) => (None, Some(id), None),
            Backing::Ingredient(id) => (None, None, Some(id)),
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub recipe_id: Option<i64>,
    #[serde(default)]
    pub tool_id: Option<i64>,
    #[serde(default)]
    pub ingredient_id: Option<i64>,
    #[serde(flatten)]
    pub fields: ProductFields,
}

/// Mutable product attributes. The backing is fixed at creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub stock: i32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Validate for ProductFields {
    fn validate(&self) -> Result<(), ApiError> {
        non_empty("title", &self.title)?;
        max_chars("title", &self.title, 255)?;
        if self.price < 0 {
            return Err(ApiError::validation("price must not be negative"));
        }
        if self.stock < 0 {
            return Err(ApiError::validation("stock must not be negative"));
        }
        Ok(())
    }
}

impl ProductInput {
    /// Resolves the single backing reference. Zero or negative ids count as unset.
    pub fn backing(&self) -> Result<Backing, ApiError> {
        let set = |v: Option<i64>| v.filter(|id| *id > 0);
        let candidates = [
            set(self.recipe_id).map(Backing::Recipe),
            set(self.tool_id).map(Backing::Tool),
            set(self.ingredient_id).map(Backing::Ingredient),
        ];
        let mut chosen = candidates.into_iter().flatten();
        match (chosen.next(), chosen.next()) {
            (Some(backing), None) => Ok(backing),
            (None, _) => Err(ApiError::validation(
                "recipe_id, tool_id or ingredient_id is required",
            )),
            (Some(_), Some(_)) => Err(ApiError::validation(
                "only one of recipe_id, tool_id or ingredient_id may be set",
            )),
        }
    }
}

impl Validate for ProductInput {
    fn validate(&self) -> Result<(), ApiError> {
        self.backing()?;
        self.fields.validate()
    }
}

#[derive(Debug, Serialize)]
pub struct ProductWriteResponse {
    pub id: i64,
    pub message: &'static str,
    pub indexed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn input(extra: Value) -> ProductInput {
        let mut body = json!({ "title": "Grandma's pesto", "price": 1299, "stock": 3 });
        if let (Value::Object(base), Value::Object(more)) = (&mut body, extra) {
            base.extend(more);
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn no_backing_is_required_error() {
        let err = input(json!({})).validate().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.public_message().ends_with("is required"));
    }

    #[test]
    fn zero_ids_count_as_unset() {
        let err = input(json!({ "recipe_id": 0, "tool_id": 0 })).backing().unwrap_err();
        assert!(err.public_message().ends_with("is required"));
    }

    #[test]
    fn two_backings_are_rejected() {
        let err = input(json!({ "recipe_id": 1, "ingredient_id": 2 }))
            .validate()
            .unwrap_err();
        assert!(err.public_message().starts_with("only one of"));
    }

    #[test]
    fn exactly_one_backing_is_accepted() {
        let p = input(json!({ "tool_id": 8 }));
        assert!(p.validate().is_ok());
        assert_eq!(p.backing().unwrap(), Backing::Tool(8));
        assert_eq!(Backing::Tool(8).columns(), (None, Some(8), None));
        assert!(p.fields.is_active);
    }

    #[test]
    fn negative_price_is_rejected() {
        let p = input(json!({ "ingredient_id": 1, "price": -1 }));
        assert_eq!(p.validate().unwrap_err().public_message(), "price must not be negative");
    }
}
