use diesel::mysql::Mysql;
use diesel::prelude::*;
use diesel::query_builder::BoxedSelectStatement;
use diesel::r2d2::{self, ConnectionManager};

use crate::error::StorageError;
use crate::models::{
    AmountRow, Ingredient, IngredientAmount, IngredientId, MarkKind, NewIngredient, NewRecipe,
    PageRequest, Paged, Recipe, RecipeChanges, RecipeFilter, RecipeId, RecipeIngredientRow, Tag,
    TagId, User, UserId,
};
use crate::repository::{RepoResult, Repository};
use crate::schema::{
    favorites, ingredients, recipe_ingredients, recipe_tags, recipes, shopping_carts,
    subscriptions, tags, users,
};

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

no_arg_sql_function!(
    last_insert_id,
    diesel::sql_types::Unsigned<diesel::sql_types::BigInt>
);

/// [`Repository`] over one pooled MySQL connection.
pub struct MysqlRepository<'a> {
    conn: &'a MysqlConnection,
}

impl<'a> MysqlRepository<'a> {
    pub fn new(conn: &'a MysqlConnection) -> Self {
        MysqlRepository { conn }
    }

    fn replace_tags(&self, recipe: RecipeId, tag_ids: &[TagId]) -> RepoResult<()> {
        diesel::delete(recipe_tags::table.filter(recipe_tags::recipe_id.eq(recipe)))
            .execute(self.conn)?;
        if !tag_ids.is_empty() {
            let rows: Vec<_> = tag_ids
                .iter()
                .map(|tag| {
                    (
                        recipe_tags::recipe_id.eq(recipe),
                        recipe_tags::tag_id.eq(*tag),
                    )
                })
                .collect();
            diesel::insert_into(recipe_tags::table)
                .values(&rows)
                .execute(self.conn)?;
        }
        Ok(())
    }

    fn replace_ingredients(
        &self,
        recipe: RecipeId,
        amounts: &[IngredientAmount],
    ) -> RepoResult<()> {
        diesel::delete(recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe)))
            .execute(self.conn)?;
        //there should always be ingredients here but an empty insert is invalid sql anyway
        if !amounts.is_empty() {
            let rows: Vec<_> = amounts
                .iter()
                .map(|item| {
                    (
                        recipe_ingredients::recipe_id.eq(recipe),
                        recipe_ingredients::ingredient_id.eq(item.ingredient_id),
                        recipe_ingredients::amount.eq(item.amount),
                    )
                })
                .collect();
            diesel::insert_into(recipe_ingredients::table)
                .values(&rows)
                .execute(self.conn)?;
        }
        Ok(())
    }
}

/// Narrows a boxed query over `recipes` to the rows matching `filter`. Every
/// condition is a subselect evaluated by the database.
fn filter_recipes<'a, ST>(
    mut query: BoxedSelectStatement<'a, ST, recipes::table, Mysql>,
    filter: &RecipeFilter,
) -> BoxedSelectStatement<'a, ST, recipes::table, Mysql> {
    if let Some(author) = filter.author {
        query = query.filter(recipes::author_id.eq(author));
    }
    if !filter.tags.is_empty() {
        query = query.filter(
            recipes::id.eq_any(
                recipe_tags::table
                    .filter(
                        recipe_tags::tag_id.eq_any(
                            tags::table
                                .filter(tags::slug.eq_any(filter.tags.clone()))
                                .select(tags::id),
                        ),
                    )
                    .select(recipe_tags::recipe_id),
            ),
        );
    }
    if let Some(user) = filter.favorited_by {
        query = query.filter(
            recipes::id.eq_any(
                favorites::table
                    .filter(favorites::user_id.eq(user))
                    .select(favorites::recipe_id),
            ),
        );
    }
    if let Some(user) = filter.in_cart_of {
        query = query.filter(
            recipes::id.eq_any(
                shopping_carts::table
                    .filter(shopping_carts::user_id.eq(user))
                    .select(shopping_carts::recipe_id),
            ),
        );
    }
    query
}

/// Newest first, one page window.
fn recipe_page<'a>(filter: &RecipeFilter, page: PageRequest) -> recipes::BoxedQuery<'a, Mysql> {
    filter_recipes(recipes::table.into_boxed(), filter)
        .order((recipes::created_at.desc(), recipes::id.desc()))
        .limit(i64::from(page.limit()))
        .offset(page.offset())
}

impl Repository for MysqlRepository<'_> {
    fn find_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(users::table.find(id).first::<User>(self.conn).optional()?)
    }

    fn find_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(users::table
            .filter(users::id.eq_any(ids))
            .load::<User>(self.conn)?)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        Ok(tags::table.order(tags::id.asc()).load::<Tag>(self.conn)?)
    }

    fn find_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        Ok(tags::table.find(id).first::<Tag>(self.conn).optional()?)
    }

    fn existing_tag_ids(&self, ids: &[TagId]) -> RepoResult<Vec<TagId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tags::table
            .filter(tags::id.eq_any(ids))
            .select(tags::id)
            .load::<TagId>(self.conn)?)
    }

    fn list_ingredients(&self) -> RepoResult<Vec<Ingredient>> {
        Ok(ingredients::table
            .order((ingredients::name.asc(), ingredients::id.asc()))
            .load::<Ingredient>(self.conn)?)
    }

    fn find_ingredient(&self, id: IngredientId) -> RepoResult<Option<Ingredient>> {
        Ok(ingredients::table
            .find(id)
            .first::<Ingredient>(self.conn)
            .optional()?)
    }

    fn existing_ingredient_ids(&self, ids: &[IngredientId]) -> RepoResult<Vec<IngredientId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(ingredients::table
            .filter(ingredients::id.eq_any(ids))
            .select(ingredients::id)
            .load::<IngredientId>(self.conn)?)
    }

    fn insert_ingredients(&self, items: &[NewIngredient]) -> RepoResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.conn.transaction::<_, StorageError, _>(|| {
            Ok(diesel::insert_into(ingredients::table)
                .values(items)
                .execute(self.conn)?)
        })
    }

    fn insert_recipe(
        &self,
        recipe: &NewRecipe,
        tag_ids: &[TagId],
        amounts: &[IngredientAmount],
    ) -> RepoResult<RecipeId> {
        self.conn.transaction::<_, StorageError, _>(|| {
            diesel::insert_into(recipes::table)
                .values(recipe)
                .execute(self.conn)?;
            let raw_id = diesel::select(last_insert_id).first::<u64>(self.conn)?;
            let id = RecipeId::try_from(raw_id).map_err(|_| {
                StorageError::Inconsistent(format!("recipe id {} overflows", raw_id))
            })?;
            self.replace_tags(id, tag_ids)?;
            self.replace_ingredients(id, amounts)?;
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
        self.conn.transaction::<_, StorageError, _>(|| {
            if !changes.is_empty() {
                diesel::update(recipes::table.find(id))
                    .set(changes)
                    .execute(self.conn)?;
            }
            if let Some(tag_ids) = tag_ids {
                self.replace_tags(id, tag_ids)?;
            }
            self.replace_ingredients(id, amounts)
        })
    }

    fn delete_recipe(&self, id: RecipeId) -> RepoResult<bool> {
        let deleted = diesel::delete(recipes::table.find(id)).execute(self.conn)?;
        Ok(deleted > 0)
    }

    fn find_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>> {
        Ok(recipes::table
            .find(id)
            .first::<Recipe>(self.conn)
            .optional()?)
    }

    fn list_recipes(&self, filter: &RecipeFilter, page: PageRequest) -> RepoResult<Paged<Recipe>> {
        let count = filter_recipes(recipes::table.count().into_boxed(), filter)
            .get_result::<i64>(self.conn)?;
        let results = recipe_page(filter, page).load::<Recipe>(self.conn)?;
        Ok(Paged {
            count,
            page,
            results,
        })
    }

    fn recipes_by_author(&self, author: UserId, limit: Option<i64>) -> RepoResult<Vec<Recipe>> {
        let mut query = recipes::table
            .filter(recipes::author_id.eq(author))
            .order((recipes::created_at.desc(), recipes::id.desc()))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit.max(0));
        }
        Ok(query.load::<Recipe>(self.conn)?)
    }

    fn count_recipes_by_author(&self, author: UserId) -> RepoResult<i64> {
        Ok(recipes::table
            .filter(recipes::author_id.eq(author))
            .count()
            .get_result::<i64>(self.conn)?)
    }

    fn tags_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<(RecipeId, Tag)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(recipe_tags::table
            .inner_join(tags::table)
            .filter(recipe_tags::recipe_id.eq_any(ids))
            .select((recipe_tags::recipe_id, tags::all_columns))
            .order(tags::id.asc())
            .load::<(RecipeId, Tag)>(self.conn)?)
    }

    fn ingredients_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<RecipeIngredientRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = recipe_ingredients::table
            .inner_join(ingredients::table)
            .filter(recipe_ingredients::recipe_id.eq_any(ids))
            .select((
                recipe_ingredients::recipe_id,
                ingredients::all_columns,
                recipe_ingredients::amount,
            ))
            .order(ingredients::name.asc())
            .load::<(RecipeId, Ingredient, u32)>(self.conn)?;
        Ok(rows
            .into_iter()
            .map(|(recipe_id, ingredient, amount)| RecipeIngredientRow {
                recipe_id,
                ingredient,
                amount,
            })
            .collect())
    }

    fn add_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<()> {
        match kind {
            MarkKind::Favorite => diesel::insert_into(favorites::table)
                .values((favorites::user_id.eq(user), favorites::recipe_id.eq(recipe)))
                .execute(self.conn)?,
            MarkKind::ShoppingCart => diesel::insert_into(shopping_carts::table)
                .values((
                    shopping_carts::user_id.eq(user),
                    shopping_carts::recipe_id.eq(recipe),
                ))
                .execute(self.conn)?,
        };
        Ok(())
    }

    fn remove_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<bool> {
        let deleted = match kind {
            MarkKind::Favorite => diesel::delete(
                favorites::table
                    .filter(favorites::user_id.eq(user))
                    .filter(favorites::recipe_id.eq(recipe)),
            )
            .execute(self.conn)?,
            MarkKind::ShoppingCart => diesel::delete(
                shopping_carts::table
                    .filter(shopping_carts::user_id.eq(user))
                    .filter(shopping_carts::recipe_id.eq(recipe)),
            )
            .execute(self.conn)?,
        };
        Ok(deleted > 0)
    }

    fn marked_among(
        &self,
        kind: MarkKind,
        user: UserId,
        recipe_ids: &[RecipeId],
    ) -> RepoResult<Vec<RecipeId>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let marked = match kind {
            MarkKind::Favorite => favorites::table
                .filter(favorites::user_id.eq(user))
                .filter(favorites::recipe_id.eq_any(recipe_ids))
                .select(favorites::recipe_id)
                .load::<RecipeId>(self.conn)?,
            MarkKind::ShoppingCart => shopping_carts::table
                .filter(shopping_carts::user_id.eq(user))
                .filter(shopping_carts::recipe_id.eq_any(recipe_ids))
                .select(shopping_carts::recipe_id)
                .load::<RecipeId>(self.conn)?,
        };
        Ok(marked)
    }

    fn find_cart_recipes(&self, user: UserId) -> RepoResult<Vec<RecipeId>> {
        Ok(shopping_carts::table
            .filter(shopping_carts::user_id.eq(user))
            .select(shopping_carts::recipe_id)
            .load::<RecipeId>(self.conn)?)
    }

    // summed in rust: mysql reports SUM over integers as DECIMAL
    fn ingredient_amounts(&self, recipe_ids: &[RecipeId]) -> RepoResult<Vec<AmountRow>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(recipe_ingredients::table
            .inner_join(ingredients::table)
            .filter(recipe_ingredients::recipe_id.eq_any(recipe_ids))
            .select((
                ingredients::name,
                ingredients::measurement_unit,
                recipe_ingredients::amount,
            ))
            .load::<AmountRow>(self.conn)?)
    }

    fn add_subscription(&self, follower: UserId, author: UserId) -> RepoResult<()> {
        diesel::insert_into(subscriptions::table)
            .values((
                subscriptions::follower_id.eq(follower),
                subscriptions::author_id.eq(author),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn remove_subscription(&self, follower: UserId, author: UserId) -> RepoResult<bool> {
        let deleted = diesel::delete(
            subscriptions::table
                .filter(subscriptions::follower_id.eq(follower))
                .filter(subscriptions::author_id.eq(author)),
        )
        .execute(self.conn)?;
        Ok(deleted > 0)
    }

    fn subscribed_among(&self, follower: UserId, authors: &[UserId]) -> RepoResult<Vec<UserId>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        Ok(subscriptions::table
            .filter(subscriptions::follower_id.eq(follower))
            .filter(subscriptions::author_id.eq_any(authors))
            .select(subscriptions::author_id)
            .load::<UserId>(self.conn)?)
    }

    fn list_subscriptions(&self, follower: UserId, page: PageRequest) -> RepoResult<Paged<User>> {
        let count = subscriptions::table
            .filter(subscriptions::follower_id.eq(follower))
            .count()
            .get_result::<i64>(self.conn)?;
        let authors = subscriptions::table
            .inner_join(users::table.on(users::id.eq(subscriptions::author_id)))
            .filter(subscriptions::follower_id.eq(follower))
            .select(users::all_columns)
            .order(users::id.asc())
            .limit(i64::from(page.limit()))
            .offset(page.offset())
            .load::<User>(self.conn)?;
        Ok(Paged {
            count,
            page,
            results: authors,
        })
    }
}
