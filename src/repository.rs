use crate::{
    error::StorageError,
    models::{
        AmountRow, Ingredient, IngredientAmount, IngredientId, MarkKind, NewIngredient, NewRecipe,
        PageRequest, Paged, Recipe, RecipeChanges, RecipeFilter, RecipeId, RecipeIngredientRow,
        Tag, TagId, User, UserId,
    },
};

pub type RepoResult<T> = Result<T, StorageError>;

/// Storage operations the recipe services rely on.
///
/// Implementations must enforce the unique keys of the join tables and
/// report a clash as [`StorageError::UniqueViolation`]; the favorite, cart
/// and subscription toggles depend on it instead of checking first.
pub trait Repository {
    fn find_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;

    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    fn find_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    fn existing_tag_ids(&self, ids: &[TagId]) -> RepoResult<Vec<TagId>>;

    /// Whole catalog, ordered by name.
    fn list_ingredients(&self) -> RepoResult<Vec<Ingredient>>;
    fn find_ingredient(&self, id: IngredientId) -> RepoResult<Option<Ingredient>>;
    fn existing_ingredient_ids(&self, ids: &[IngredientId]) -> RepoResult<Vec<IngredientId>>;
    /// Bulk load in one transaction; returns the number of rows written.
    fn insert_ingredients(&self, items: &[NewIngredient]) -> RepoResult<usize>;

    /// Inserts the recipe with its tag and ingredient rows atomically.
    fn insert_recipe(
        &self,
        recipe: &NewRecipe,
        tags: &[TagId],
        ingredients: &[IngredientAmount],
    ) -> RepoResult<RecipeId>;
    /// Applies `changes` and replaces the ingredient rows of the recipe, and
    /// its tag rows when `tags` is given, in one transaction; readers see
    /// either the old or the new set.
    fn update_recipe(
        &self,
        id: RecipeId,
        changes: &RecipeChanges,
        tags: Option<&[TagId]>,
        ingredients: &[IngredientAmount],
    ) -> RepoResult<()>;
    /// Returns false when there was nothing to delete.
    fn delete_recipe(&self, id: RecipeId) -> RepoResult<bool>;
    fn find_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>>;
    /// Newest first.
    fn list_recipes(&self, filter: &RecipeFilter, page: PageRequest) -> RepoResult<Paged<Recipe>>;
    fn recipes_by_author(&self, author: UserId, limit: Option<i64>) -> RepoResult<Vec<Recipe>>;
    fn count_recipes_by_author(&self, author: UserId) -> RepoResult<i64>;
    fn tags_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<(RecipeId, Tag)>>;
    fn ingredients_for_recipes(&self, ids: &[RecipeId]) -> RepoResult<Vec<RecipeIngredientRow>>;

    fn add_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<()>;
    fn remove_mark(&self, kind: MarkKind, user: UserId, recipe: RecipeId) -> RepoResult<bool>;
    /// The subset of `recipes` the user has marked with `kind`.
    fn marked_among(
        &self,
        kind: MarkKind,
        user: UserId,
        recipes: &[RecipeId],
    ) -> RepoResult<Vec<RecipeId>>;

    fn find_cart_recipes(&self, user: UserId) -> RepoResult<Vec<RecipeId>>;
    /// One row per (recipe, ingredient) usage among `recipes`, unsummed.
    fn ingredient_amounts(&self, recipes: &[RecipeId]) -> RepoResult<Vec<AmountRow>>;

    fn add_subscription(&self, follower: UserId, author: UserId) -> RepoResult<()>;
    fn remove_subscription(&self, follower: UserId, author: UserId) -> RepoResult<bool>;
    /// The subset of `authors` followed by `follower`.
    fn subscribed_among(&self, follower: UserId, authors: &[UserId]) -> RepoResult<Vec<UserId>>;
    /// Followed authors ordered by id.
    fn list_subscriptions(&self, follower: UserId, page: PageRequest) -> RepoResult<Paged<User>>;
}
