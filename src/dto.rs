//! Request and response records. Writes and reads use separate shapes, and
//! the conversions between them and the stored models are explicit.

use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceError,
    models::{
        Ingredient, IngredientId, Paged, Recipe, RecipeId, RecipeIngredientRow, Tag, TagId, User,
        UserId,
    },
};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientAmountInput {
    pub id: IngredientId,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecipe {
    pub ingredients: Vec<IngredientAmountInput>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// PATCH body. Ingredients are always replaced as a whole; tags are
/// replaced only when present.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRecipe {
    pub ingredients: Vec<IngredientAmountInput>,
    #[serde(default)]
    pub tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRead {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl AuthorRead {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        AuthorRead {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeIngredientRead {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

impl From<RecipeIngredientRow> for RecipeIngredientRead {
    fn from(row: RecipeIngredientRow) -> Self {
        let Ingredient {
            id,
            name,
            measurement_unit,
        } = row.ingredient;
        RecipeIngredientRead {
            id,
            name,
            measurement_unit,
            amount: row.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeRead {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: AuthorRead,
    pub ingredients: Vec<RecipeIngredientRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
}

/// Caller-specific markers attached to a recipe read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipeMarks {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeRead {
    pub fn assemble(
        recipe: Recipe,
        author: AuthorRead,
        tags: Vec<Tag>,
        ingredients: Vec<RecipeIngredientRow>,
        marks: RecipeMarks,
    ) -> Self {
        RecipeRead {
            id: recipe.id,
            tags,
            author,
            ingredients: ingredients
                .into_iter()
                .map(RecipeIngredientRead::from)
                .collect(),
            is_favorited: marks.is_favorited,
            is_in_shopping_cart: marks.is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeShort {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: u32,
}

impl From<&Recipe> for RecipeShort {
    fn from(recipe: &Recipe) -> Self {
        RecipeShort {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRead {
    #[serde(flatten)]
    pub author: AuthorRead,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

/// Recipe list filters, independent of how they arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub tags: Vec<String>,
    pub author: Option<UserId>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Query-string parameters shared by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub recipes_limit: Option<i64>,
    pub recipes: RecipeQuery,
}

impl ListParams {
    /// Builds parameters from decoded query pairs. `tags` may repeat.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ServiceError> {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => params.page = Some(parse_number(&key, &value)?),
                "limit" => params.limit = Some(parse_number(&key, &value)?),
                "recipes_limit" => params.recipes_limit = Some(parse_number(&key, &value)?),
                "author" => params.recipes.author = Some(parse_number(&key, &value)?),
                "tags" => params.recipes.tags.push(value),
                "is_favorited" => params.recipes.is_favorited = parse_flag(&value),
                "is_in_shopping_cart" => params.recipes.is_in_shopping_cart = parse_flag(&value),
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn page_request(&self, default_limit: u32) -> crate::models::PageRequest {
        let limit = self.limit.unwrap_or(default_limit).min(MAX_PAGE_SIZE);
        crate::models::PageRequest::new(self.page.unwrap_or(1), limit)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ServiceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::BadRequest(format!("{} must be a number, got {:?}", key, value)))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Page envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEnvelope<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageEnvelope<T> {
    /// `base` is the absolute URL of the endpoint without its query string;
    /// `raw_query` is the request's still-encoded query string.
    pub fn from_paged(paged: Paged<T>, base: &str, raw_query: &str) -> Self {
        let current = paged.page.page();
        let next = paged
            .has_next()
            .then(|| page_link(base, raw_query, current + 1));
        let previous = paged
            .has_previous()
            .then(|| page_link(base, raw_query, current - 1));
        PageEnvelope {
            count: paged.count,
            next,
            previous,
            results: paged.results,
        }
    }
}

fn page_link(base: &str, raw_query: &str, page: u32) -> String {
    let mut parts: Vec<String> = raw_query
        .split('&')
        .filter(|part| !part.is_empty() && !part.starts_with("page="))
        .map(str::to_string)
        .collect();
    parts.push(format!("page={}", page));
    format!("{}?{}", base, parts.join("&"))
}
