//! Ratings for recipes and products, with single-level reply threads.

mod dto;
pub mod handlers;
mod repo;

use axum::{Extension, Router};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTarget {
    Recipe,
    Product,
}

impl RatingTarget {
    pub const ALL: [RatingTarget; 2] = [RatingTarget::Recipe, RatingTarget::Product];

    pub fn table(self) -> &'static str {
        match self {
            RatingTarget::Recipe => "recipe_rating",
            RatingTarget::Product => "product_rating",
        }
    }

    /// Column referencing the rated entity.
    pub fn subject_column(self) -> &'static str {
        match self {
            RatingTarget::Recipe => "recipe_id",
            RatingTarget::Product => "product_id",
        }
    }

    /// Path segment of the rated entity (`/recipe/:id/ratings`).
    pub fn segment(self) -> &'static str {
        match self {
            RatingTarget::Recipe => "recipe",
            RatingTarget::Product => "product",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            RatingTarget::Recipe => "Recipe rating",
            RatingTarget::Product => "Product rating",
        }
    }
}

pub fn router() -> Router<AppState> {
    RatingTarget::ALL
        .into_iter()
        .fold(Router::new(), |router, target| {
            router.merge(handlers::routes(target).layer(Extension(target)))
        })
}
