//! A [`Repository`] kept in process memory. It enforces the same keys and
//! cascades as the MySQL schema and applies every write all-or-nothing, so
//! the services behave identically on top of it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};

use crate::error::StorageError;
use crate::models::{
    AmountRow, Ingredient, IngredientAmount, IngredientId, MarkKind, NewIngredient, NewRecipe,
    PageRequest, Paged, Recipe, RecipeChanges, RecipeFilter, RecipeId, RecipeIngredientRow, Tag,
    TagId, User, UserId,
};
use crate::repository::{RepoResult, Repository};

#[derive(Debug, Clone, Default)]
struct Tables {
    sequence: i32,
    users: BTreeMap<UserId, User>,
    tags: BTreeMap<TagId, Tag>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    recipes: BTreeMap<RecipeId, Recipe>,
    recipe_tags: BTreeSet<(RecipeId, TagId)>,
    recipe_ingredients: BTreeMap<(RecipeId, IngredientId), u32>,
    favorites: BTreeSet<(UserId, RecipeId)>,
    shopping_carts: BTreeSet<(UserId, RecipeId)>,
    subscriptions: BTreeSet<(UserId, UserId)>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.sequence += 1;
        self.sequence
    }

    fn marks(&self, kind: MarkKind) -> &BTreeSet<(UserId, RecipeId)> {
        match kind {
            MarkKind::Favorite => &self.favorites,
            MarkKind::ShoppingCart => &self.shopping_carts,
        }
    }

    fn marks_mut(&mut self, kind: MarkKind) -> &mut BTreeSet<(UserId, RecipeId)> {
        match kind {
            MarkKind::Favorite => &mut self.favorites,
            MarkKind::ShoppingCart => &mut self.shopping_carts,
        }
    }

    fn replace_tags(&mut self, recipe: RecipeId, tag_ids: &[TagId]) -> RepoResult<()> {
        self.recipe_tags.retain(|(owner, _)| *owner != recipe);
        for tag in tag_ids {
            if !self.tags.contains_key(tag) {
                return Err(StorageError::ForeignKeyViolation(format!("tag {}", tag)));
            }
            if !self.recipe_tags.insert((recipe, *tag)) {
                return Err(StorageError::UniqueViolation);
            }
        }
        Ok(())
    }

    fn replace_ingredients(
        &mut self,
        recipe: RecipeId,
        amounts: &[IngredientAmount],
    ) -> RepoResult<()> {
        self.recipe_ingredients
            .retain(|(owner, _), _| *owner != recipe);
        for item in amounts {
            if !self.ingredients.contains_key(&item.ingredient_id) {
                return Err(StorageError::ForeignKeyViolation(format!(
                    "ingredient {}",
                    item.ingredient_id
                )));
            }
            let key = (recipe, item.ingredient_id);
            if self.recipe_ingredients.contains_key(&key) {
                return Err(StorageError::UniqueViolation);
            }
            self.recipe_ingredients.insert(key, item.amount);
        }
        Ok(())
    }

    fn newest_first(&self) -> Vec<&Recipe> {
        let mut recipes: Vec<&Recipe> = self.recipes.values().collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recipes
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user the way the identity layer would.
    pub fn add_user(&self, username: &str) -> RepoResult<User> {
        self.transaction(|tables| {
            let id = tables.next_id();
            let user = User {
                id,
                email: format!("{}@example.com", username),
                username: username.to_string(),
                first_name: username.to_string(),
                last_name: String::new(),
            };
            tables.users.insert(id, user.clone());
            Ok(user)
        })
    }

    pub fn add_tag(&self, name: &str, color: &str, slug: &str) -> RepoResult<Tag> {
        self.transaction(|tables| {
            if tables.tags.values().any(|tag| tag.slug == slug) {
                return Err(StorageError::UniqueViolation);
            }
            let id = tables.next_id();
            let tag = Tag {
                id,
                name: name.to_string(),
                color: color.to_string(),
                slug: slug.to_string(),
            };
            tables.tags.insert(id, tag.clone());
            Ok(tag)
        })
    }

    pub fn add_ingredient(&self, name: &str, measurement_unit: &str) -> RepoResult<Ingredient> {
        self.transaction(|tables| {
            let id = tables.next_id();
            let ingredient = Ingredient {
                id,
                name: name.to_string(),
                measurement_unit: measurement_unit.to_string(),
            };
            tables.ingredients.insert(id, ingredient.clone());
            Ok(ingredient)
        })
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("in-memory store is poisoned".to_string()))
    }

    /// Runs `work` on a copy of the tables and publishes it only on success.
    fn transaction<T>(&self, work: impl FnOnce(&mut Tables) -> RepoResult<T>) -> RepoResult<T> {
        let mut tables = self.lock()?;
        let mut draft = tables.clone();
        let value = work(&mut draft)?;
        *tables = draft;
        Ok(value)
    }

    fn read<T>(&self, view: impl FnOnce(&Tables) -> T) -> RepoResult<T> {
        let tables = self.lock()?;
        Ok(view(&tables))
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Paged<T> {
    let count = items.len() as i64;
    let results = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Paged {
        count,
        page,
        results,
    }
}

impl Repository for InMemoryRepository {
    fn find_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.read(|t| t.users.get(&id).cloned())
    }

    fn find_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        self.read(|t| {
            ids.iter()
                .filter_map(|id| t.users.get(id).cloned())
                .collect()
        })
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        self.read(|t| t.tags.values().cloned().collect())
    }

    fn find_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        self.read(|t| t.tags.get(&id).cloned())
    }

    fn existing_tag_ids(&self, ids: &[TagId]) -> RepoResult<Vec<TagId>> {
        self.read(|t| {
            ids.iter()
                .copied()
                .filter(|id| t.tags.contains_key(id))
                .collect()
        })
    }

    fn list_ingredients(&self) -> RepoResult<Vec<Ingredient>> {
        self.read(|t| {
            let mut catalog: Vec<Ingredient> = t.ingredients.values().cloned().collect();
            catalog.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            catalog
        })
    }

    fn find_ingredient(&self, id: IngredientId) -> RepoResult<Option<Ingredient>> {
        self.read(|t| t.ingredients.get(&id).cloned())
    }

    fn existing_ingredient_ids(&self, ids: &[IngredientId]) -> RepoResult<Vec<IngredientId>> {
        self.read(|t| {
            ids.iter()
                .copied()
                .filter(|id| t.ingredients.contains_key(id))
                .collect()
        })
    }

    fn insert_ingredients(&self, items: &[NewIngredient]) -> RepoResult<usize> {
        self.transaction(|tables| {
            for item in items {
                let id = tables.next_id();
                tables.ingredients.insert(
                    id,
                    Ingredient {
                        id,
                        name: item.name.clone(),
                        measurement_unit: item.measurement_unit.clone(),
                    },
                );
            }
            Ok(items.len())
        })
    }

    fn insert_recipe(
        &self,
        recipe: &NewRecipe,
        tag_ids: &[TagId],
        amounts: &[IngredientAmount],
    ) -> RepoResult<RecipeId> {
        self.transaction(|tables| {
            if !tables.users.contains_key(&recipe.author_id) {
                return Err(StorageError::ForeignKeyViolation(format!(
                    "author {}",
                    recipe.author_id
                )));
            }
            let id = tables.next_id();
            tables.recipes.insert(
                id,
                Recipe {
                    id,
                    author_id: recipe.author_id,
                    name: recipe.name.clone(),
                    image: recipe.image.clone(),
                    text: recipe.text.clone(),
                    cooking_time: recipe.cooking_time,
                    created_at: now(),
                },
            );
            tables.replace_tags(id, tag_ids)?;
            tables.replace_ingredients(id, amounts)?;
            Ok(id)
        })
    }

    fn update_recipe(
        &self,
        id: RecipeId,
        changes: &RecipeChanges,
        tag_ids: Option<&[TagId]>,
        amounts: &[IngredientAmount],
    ) -> RepoResult<()> {
        self.transaction(|tables| {
            let recipe = tables
                .recipes
                .get_mut(&id)
                .ok_or_else(|| StorageError::ForeignKeyViolation(format!("recipe {}", id)))?;
            if let Some(name) = &changes.name {
                recipe.name = name.clone();
            }
            if let Some(image) = &changes.image {
                recipe.image = image.clone();
            }
            if let Some(text) = &changes.text {
                recipe.text = text.clone();
            }
            if let Some(cooking_time) = changes.cooking_time {
                recipe.cooking_time = cooking_time;
            }
            if let Some(tag_ids) = tag_ids {
                tables.replace_tags(id, tag_ids)?;
            }
            tables.replace_ingredients(id, amounts)
        })
    }

    fn delete_recipe(&self, id: RecipeId) -> RepoResult<bool> {
        self.transaction(|tables| {
            if tables.recipes.remove(&id).is_none() {
                return Ok(false);
            }
            tables.recipe_tags.retain(|(recipe, _)| *recipe != id);
            tables
                .recipe_ingredients
                .retain(|(recipe, _), _| *recipe != id);
            tables.favorites.retain(|(_, recipe)| *recipe != id);
            tables.shopping_carts.retain(|(_, recipe)| *recipe != id);
            Ok(true)
        })
    }

    fn find_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>> {
        self.read(|t| t.recipes.get(&id).cloned())
    }

    fn list_recipes(&self, filter: &RecipeFilter, page: PageRequest) -> RepoResult<Paged<Recipe>> {
        self.read(|t| {
            let matching: Vec<Recipe> = t
                .newest_first()
                .into_iter()
                .filter(|recipe| {
                    filter
                        .author
                        .map_or(true, |author| recipe.author_id == author)
                })
                .filter(|recipe| {
                    filter.tags.is_empty()
                        || t.recipe_tags.iter().any(|(owner, tag)| {
                            *owner == recipe.id
                                && t.tags
                                    .get(tag)
                                    .map_or(false, |tag| filter.tags.contains(&tag.slug))
                        })
                })
                .filter(|recipe| {
                    filter
                        .favorited_by
                        .map_or(true, |user| t.favorites.contains(&(user, recipe.id)))
                })
                .filter(|recipe| {
                    filter
                        .in_cart_of
                        .map_or(true, |user| t.shopping_carts.contains(&(user, recipe.id)))
                })
                .cloned()
                .collect();
            paginate(matching, page)
        })
    }

    fn recipes_by_author(&self, author: UserId, limit: Option<i64>) -> RepoResult<Vec<Recipe>> {
        self.read(|t| {
            let limit = limit.map_or(usize::MAX, |limit| limit.max(0) as usize);
            t.newest_first()
                .into_iter()
                .filter(|recipe| recipe.author_id == author)
                .take(limit)
                .cloned()
                .collect()
        })
    }

    fn count_recipes_by_author(&self, author: UserId) -> RepoResult<i64> {
        self.read(|t| t.recipes.values().filter(|r| r.author_id == author).count() as i64)
    }

    fn tags_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<(RecipeId, Tag)>> {
        self.read(|t| {
            t.recipe_tags
                .iter()
                .filter(|(recipe, _)| ids.contains(recipe))
                .filter_map(|(recipe, tag)| t.tags.get(tag).map(|tag| (*recipe, tag.clone())))
                .collect()
        })
    }

    fn ingredients_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<RecipeIngredientRow>> {
        self.read(|t| {
            let mut rows: Vec<RecipeIngredientRow> = t
                .recipe_ingredients
                .iter()
                .filter(|((recipe, _), _)| ids.contains(recipe))
                .filter_map(|((recipe, ingredient), amount)| {
                    t.ingredients
                        .get(ingredient)
                        .map(|ingredient| RecipeIngredientRow {
                            recipe_id: *recipe,
                            ingredient: ingredient.clone(),
                            amount: *amount,
                        })
                })
                .collect();
            rows.sort_by(|a, b| a.ingredient.name.cmp(&b.ingredient.name));
            rows
        })
    }

    fn add_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<()> {
        self.transaction(|tables| {
            if !tables.recipes.contains_key(&recipe) {
                return Err(StorageError::ForeignKeyViolation(format!(
                    "recipe {}",
                    recipe
                )));
            }
            if !tables.users.contains_key(&user) {
                return Err(StorageError::ForeignKeyViolation(format!("user {}", user)));
            }
            if !tables.marks_mut(kind).insert((user, recipe)) {
                return Err(StorageError::UniqueViolation);
            }
            Ok(())
        })
    }

    fn remove_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<bool> {
        self.transaction(|tables| Ok(tables.marks_mut(kind).remove(&(user, recipe))))
    }

    fn marked_among(
        &self,
        kind: MarkKind,
        user: UserId,
        recipes: &[RecipeId],
    ) -> RepoResult<Vec<RecipeId>> {
        self.read(|t| {
            recipes
                .iter()
                .copied()
                .filter(|recipe| t.marks(kind).contains(&(user, *recipe)))
                .collect()
        })
    }

    fn find_cart_recipes(&self, user: UserId) -> RepoResult<Vec<RecipeId>> {
        self.read(|t| {
            t.shopping_carts
                .iter()
                .filter(|(owner, _)| *owner == user)
                .map(|(_, recipe)| *recipe)
                .collect()
        })
    }

    fn ingredient_amounts(&self, recipes: &[RecipeId]) -> RepoResult<Vec<AmountRow>> {
        self.read(|t| {
            t.recipe_ingredients
                .iter()
                .filter(|((recipe, _), _)| recipes.contains(recipe))
                .filter_map(|((_, ingredient), amount)| {
                    t.ingredients.get(ingredient).map(|ingredient| AmountRow {
                        name: ingredient.name.clone(),
                        measurement_unit: ingredient.measurement_unit.clone(),
                        amount: *amount,
                    })
                })
                .collect()
        })
    }

    fn add_subscription(&self, follower: UserId, author: UserId) -> RepoResult<()> {
        self.transaction(|tables| {
            for user in [follower, author] {
                if !tables.users.contains_key(&user) {
                    return Err(StorageError::ForeignKeyViolation(format!("user {}", user)));
                }
            }
            if !tables.subscriptions.insert((follower, author)) {
                return Err(StorageError::UniqueViolation);
            }
            Ok(())
        })
    }

    fn remove_subscription(&self, follower: UserId, author: UserId) -> RepoResult<bool> {
        self.transaction(|tables| Ok(tables.subscriptions.remove(&(follower, author))))
    }

    fn subscribed_among(&self, follower: UserId, authors: &[UserId]) -> RepoResult<Vec<UserId>> {
        self.read(|t| {
            authors
                .iter()
                .copied()
                .filter(|author| t.subscriptions.contains(&(follower, *author)))
                .collect()
        })
    }

    fn list_subscriptions(&self, follower: UserId, page: PageRequest) -> RepoResult<Paged<User>> {
        self.read(|t| {
            let authors: Vec<User> = t
                .subscriptions
                .iter()
                .filter(|(owner, _)| *owner == follower)
                .filter_map(|(_, author)| t.users.get(author).cloned())
                .collect();
            paginate(authors, page)
        })
    }
}
