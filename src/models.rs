use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schema::{ingredients, recipes};

pub type UserId = i32;
pub type TagId = i32;
pub type IngredientId = i32;
pub type RecipeId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    /// Decodes a catalog snapshot written by [`Ingredient::catalog_to_u8`].
    pub fn catalog_from_u8(bytes: &[u8]) -> Result<Vec<Self>, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn catalog_to_u8(catalog: &[Self]) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(catalog)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Insertable)]
#[table_name = "ingredients"]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct Recipe {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[table_name = "recipes"]
pub struct NewRecipe {
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
}

/// Column updates for a recipe; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset)]
#[table_name = "recipes"]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<u32>,
}

impl RecipeChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image.is_none()
            && self.text.is_none()
            && self.cooking_time.is_none()
    }
}

// pair <ingredient, amount> as it is written to recipe_ingredients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: IngredientId,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientRow {
    pub recipe_id: RecipeId,
    pub ingredient: Ingredient,
    pub amount: u32,
}

/// One (ingredient, amount) usage of a carted recipe, before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct AmountRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

/// Per-user markers on a recipe that share the add/remove lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    Favorite,
    ShoppingCart,
}

impl MarkKind {
    pub fn label(self) -> &'static str {
        match self {
            MarkKind::Favorite => "favorites",
            MarkKind::ShoppingCart => "shopping cart",
        }
    }
}

/// An authenticated caller as reported by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: UserId) -> Self {
        Actor {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Actor { id, is_admin: true }
    }

    pub fn can_modify(&self, recipe: &Recipe) -> bool {
        self.is_admin || recipe.author_id == self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<UserId>,
    pub favorited_by: Option<UserId>,
    pub in_cart_of: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Pages are 1-based; zero page or limit are raised to 1.
    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub count: i64,
    pub page: PageRequest,
    pub results: Vec<T>,
}

impl<T> Paged<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Paged<U> {
        Paged {
            count: self.count,
            page: self.page,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page.offset() + (self.results.len() as i64) < self.count
    }

    pub fn has_previous(&self) -> bool {
        self.page.page() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_survives_cache_encoding() {
        let catalog = vec![Ingredient {
            id: 3,
            name: "соль".to_string(),
            measurement_unit: "г".to_string(),
        }];

        let bytes = Ingredient::catalog_to_u8(&catalog).unwrap();
        assert_eq!(Ingredient::catalog_from_u8(&bytes).unwrap(), catalog);
    }

    #[test]
    fn page_window_reports_neighbours() {
        let paged = Paged {
            count: 13,
            page: PageRequest::new(2, 6),
            results: vec![(); 6],
        };
        assert!(paged.has_next());
        assert!(paged.has_previous());

        let last = Paged {
            count: 13,
            page: PageRequest::new(3, 6),
            results: vec![()],
        };
        assert!(!last.has_next());
        assert_eq!(last.page.offset(), 12);
    }

    #[test]
    fn zero_page_and_limit_are_raised() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn only_author_or_admin_modify() {
        let recipe = Recipe {
            id: 1,
            author_id: 7,
            name: "Борщ".to_string(),
            image: String::new(),
            text: "варить".to_string(),
            cooking_time: 90,
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert!(Actor::user(7).can_modify(&recipe));
        assert!(!Actor::user(8).can_modify(&recipe));
        assert!(Actor::admin(8).can_modify(&recipe));
    }
}
