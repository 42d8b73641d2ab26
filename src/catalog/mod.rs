//! Ingredient, tool and pantry catalogs. The three share one shape and differ only
//! in table, index and which recipe association (if any) points at them.

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use axum::{Extension, Router};

use crate::search::IndexName;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Ingredient,
    Tool,
    Pantry,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 3] = [
        CatalogKind::Ingredient,
        CatalogKind::Tool,
        CatalogKind::Pantry,
    ];

    pub fn table(self) -> &'static str {
        match self {
            CatalogKind::Ingredient => "ingredients",
            CatalogKind::Tool => "tools",
            CatalogKind::Pantry => "pantries",
        }
    }

    pub fn index(self) -> IndexName {
        match self {
            CatalogKind::Ingredient => IndexName::Ingredients,
            CatalogKind::Tool => IndexName::Tools,
            CatalogKind::Pantry => IndexName::Pantries,
        }
    }

    pub fn from_index(index: IndexName) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.index() == index)
    }

    /// Singular path segment, e.g. `/tool/:id`.
    pub fn singular(self) -> &'static str {
        match self {
            CatalogKind::Ingredient => "ingredient",
            CatalogKind::Tool => "tool",
            CatalogKind::Pantry => "pantry",
        }
    }

    /// Plural path segment; pantries do not pluralise with a plain `s`.
    pub fn plural(self) -> &'static str {
        self.table()
    }

    pub fn noun(self) -> &'static str {
        match self {
            CatalogKind::Ingredient => "Ingredient",
            CatalogKind::Tool => "Tool",
            CatalogKind::Pantry => "Pantry item",
        }
    }

    /// Association table and column through which recipes reference this catalog.
    pub fn recipe_link(self) -> Option<(&'static str, &'static str)> {
        match self {
            CatalogKind::Ingredient => Some(("recipe_ingredient", "ingredient_id")),
            CatalogKind::Tool => Some(("recipe_tool", "tool_id")),
            CatalogKind::Pantry => None,
        }
    }

    pub fn requires_unit(self) -> bool {
        self == CatalogKind::Ingredient
    }
}

pub fn router() -> Router<AppState> {
    CatalogKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| {
            router.merge(handlers::routes(kind).layer(Extension(kind)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_indexes() {
        for kind in CatalogKind::ALL {
            assert_eq!(CatalogKind::from_index(kind.index()), Some(kind));
        }
        assert_eq!(CatalogKind::from_index(IndexName::Products), None);
    }

    #[test]
    fn only_ingredients_and_tools_are_linked_from_recipes() {
        assert_eq!(
            CatalogKind::Tool.recipe_link(),
            Some(("recipe_tool", "tool_id"))
        );
        assert_eq!(CatalogKind::Pantry.recipe_link(), None);
    }
}
