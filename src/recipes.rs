use std::collections::{HashMap, HashSet};

use log::{info, warn};

use crate::{
    dto::{AuthorRead, CreateRecipe, RecipeMarks, RecipeQuery, RecipeRead, UpdateRecipe},
    error::{NotFoundError, ServiceError, StorageError},
    models::{
        Actor, IngredientAmount, MarkKind, NewRecipe, PageRequest, Paged, Recipe, RecipeChanges,
        RecipeFilter, RecipeId, RecipeIngredientRow, Tag, TagId, UserId,
    },
    repository::Repository,
    validator,
};

pub fn create_recipe<R: Repository>(
    repo: &R,
    author: UserId,
    input: CreateRecipe,
) -> Result<RecipeRead, ServiceError> {
    let ingredients = validator::validate_ingredients(input.ingredients)?;
    validator::validate_tags(&input.tags)?;
    let recipe = NewRecipe {
        author_id: author,
        name: validator::validate_name(&input.name)?,
        image: input.image.unwrap_or_default(),
        text: validator::validate_text(&input.text)?,
        cooking_time: validator::validate_cooking_time(input.cooking_time)?,
    };
    ensure_references(repo, &ingredients, &input.tags)?;

    let id = repo.insert_recipe(&recipe, &input.tags, &ingredients)?;
    info!("user {} created recipe {}", author, id);
    get_recipe(repo, Some(author), id)
}

pub fn update_recipe<R: Repository>(
    repo: &R,
    actor: Actor,
    id: RecipeId,
    input: UpdateRecipe,
) -> Result<RecipeRead, ServiceError> {
    let recipe = find_recipe(repo, id)?;
    if !actor.can_modify(&recipe) {
        return Err(ServiceError::Forbidden);
    }

    let ingredients = validator::validate_ingredients(input.ingredients)?;
    if let Some(tags) = &input.tags {
        validator::validate_tags(tags)?;
    }
    let changes = RecipeChanges {
        name: input
            .name
            .as_deref()
            .map(validator::validate_name)
            .transpose()?,
        image: input.image,
        text: input
            .text
            .as_deref()
            .map(validator::validate_text)
            .transpose()?,
        cooking_time: input
            .cooking_time
            .map(validator::validate_cooking_time)
            .transpose()?,
    };
    ensure_references(
        repo,
        &ingredients,
        input.tags.as_deref().unwrap_or_default(),
    )?;

    repo.update_recipe(id, &changes, input.tags.as_deref(), &ingredients)?;
    info!("user {} updated recipe {}", actor.id, id);
    get_recipe(repo, Some(actor.id), id)
}

pub fn delete_recipe<R: Repository>(
    repo: &R,
    actor: Actor,
    id: RecipeId,
) -> Result<(), ServiceError> {
    let recipe = find_recipe(repo, id)?;
    if !actor.can_modify(&recipe) {
        return Err(ServiceError::Forbidden);
    }
    if !repo.delete_recipe(id)? {
        return Err(NotFoundError::UnknownRecipe(id).into());
    }
    info!("user {} deleted recipe {}", actor.id, id);
    Ok(())
}

pub fn get_recipe<R: Repository>(
    repo: &R,
    viewer: Option<UserId>,
    id: RecipeId,
) -> Result<RecipeRead, ServiceError> {
    let recipe = find_recipe(repo, id)?;
    hydrate(repo, viewer, vec![recipe])?
        .pop()
        .ok_or_else(|| NotFoundError::UnknownRecipe(id).into())
}

pub fn list_recipes<R: Repository>(
    repo: &R,
    viewer: Option<UserId>,
    query: RecipeQuery,
    page: PageRequest,
) -> Result<Paged<RecipeRead>, ServiceError> {
    // caller-relative filters mean nothing to an anonymous caller
    let filter = RecipeFilter {
        tags: query.tags,
        author: query.author,
        favorited_by: viewer.filter(|_| query.is_favorited),
        in_cart_of: viewer.filter(|_| query.is_in_shopping_cart),
    };
    let recipes = repo.list_recipes(&filter, page)?;
    let results = hydrate(repo, viewer, recipes.results)?;
    Ok(Paged {
        count: recipes.count,
        page: recipes.page,
        results,
    })
}

fn find_recipe<R: Repository>(repo: &R, id: RecipeId) -> Result<Recipe, ServiceError> {
    Ok(repo
        .find_recipe(id)?
        .ok_or(NotFoundError::UnknownRecipe(id))?)
}

fn ensure_references<R: Repository>(
    repo: &R,
    ingredients: &[IngredientAmount],
    tags: &[TagId],
) -> Result<(), ServiceError> {
    let wanted: Vec<_> = ingredients.iter().map(|item| item.ingredient_id).collect();
    let known: HashSet<_> = repo.existing_ingredient_ids(&wanted)?.into_iter().collect();
    if let Some(missing) = wanted.iter().find(|id| !known.contains(*id)) {
        return Err(NotFoundError::UnknownIngredient(*missing).into());
    }

    let known: HashSet<_> = repo.existing_tag_ids(tags)?.into_iter().collect();
    if let Some(missing) = tags.iter().find(|id| !known.contains(*id)) {
        return Err(NotFoundError::UnknownTag(*missing).into());
    }
    Ok(())
}

/// Loads tags, ingredients, authors and the viewer's markers for a batch of
/// recipes with one query per kind, preserving the input order.
fn hydrate<R: Repository>(
    repo: &R,
    viewer: Option<UserId>,
    recipes: Vec<Recipe>,
) -> Result<Vec<RecipeRead>, ServiceError> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<RecipeId> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<UserId> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut tags: HashMap<RecipeId, Vec<Tag>> = HashMap::new();
    for (recipe, tag) in repo.tags_for_recipes(&ids)? {
        tags.entry(recipe).or_default().push(tag);
    }
    let mut ingredients: HashMap<RecipeId, Vec<RecipeIngredientRow>> = HashMap::new();
    for row in repo.ingredients_for_recipes(&ids)? {
        ingredients.entry(row.recipe_id).or_default().push(row);
    }
    let authors: HashMap<UserId, _> = repo
        .find_users(&author_ids)?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let (favorited, carted, followed) = match viewer {
        Some(user) => (
            repo.marked_among(MarkKind::Favorite, user, &ids)?,
            repo.marked_among(MarkKind::ShoppingCart, user, &ids)?,
            repo.subscribed_among(user, &author_ids)?,
        ),
        None => (Vec::new(), Vec::new(), Vec::new()),
    };
    let favorited: HashSet<_> = favorited.into_iter().collect();
    let carted: HashSet<_> = carted.into_iter().collect();
    let followed: HashSet<_> = followed.into_iter().collect();

    recipes
        .into_iter()
        .map(|recipe| {
            let author = match authors.get(&recipe.author_id) {
                Some(user) => AuthorRead::new(user.clone(), followed.contains(&user.id)),
                None => {
                    warn!(
                        "recipe {} points at missing author {}",
                        recipe.id, recipe.author_id
                    );
                    return Err(StorageError::Inconsistent(format!(
                        "author {} of recipe {} is missing",
                        recipe.author_id, recipe.id
                    ))
                    .into());
                }
            };
            let marks = RecipeMarks {
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: carted.contains(&recipe.id),
            };
            let tags = tags.remove(&recipe.id).unwrap_or_default();
            let ingredients = ingredients.remove(&recipe.id).unwrap_or_default();
            Ok(RecipeRead::assemble(
                recipe,
                author,
                tags,
                ingredients,
                marks,
            ))
        })
        .collect()
}
