use foodgram::{
    dto::{CreateRecipe, IngredientAmountInput, RecipeQuery},
    error::{ConflictError, NotFoundError, ServiceError},
    memory::InMemoryRepository,
    models::{Actor, MarkKind, PageRequest, RecipeId, UserId},
    recipes, shopping_list, toggle,
};

fn recipe(repo: &InMemoryRepository, author: UserId, name: &str, items: &[(i32, i64)]) -> RecipeId {
    let input = CreateRecipe {
        ingredients: items
            .iter()
            .map(|&(id, amount)| IngredientAmountInput { id, amount })
            .collect(),
        tags: vec![],
        image: None,
        name: name.to_string(),
        text: "готовить".to_string(),
        cooking_time: 10,
    };
    recipes::create_recipe(repo, author, input).unwrap().id
}

#[test]
fn favorite_round_trip() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    let salt = repo.add_ingredient("соль", "г").unwrap();
    let soup = recipe(&repo, cook.id, "Суп", &[(salt.id, 5)]);

    let short = toggle::add_mark(&repo, MarkKind::Favorite, cook.id, soup).unwrap();
    assert_eq!(short.id, soup);
    assert_eq!(short.name, "Суп");
    assert!(matches!(
        toggle::add_mark(&repo, MarkKind::Favorite, cook.id, soup),
        Err(ServiceError::Conflict(ConflictError::AlreadyExists))
    ));

    let seen = recipes::get_recipe(&repo, Some(cook.id), soup).unwrap();
    assert!(seen.is_favorited);
    assert!(!seen.is_in_shopping_cart);

    toggle::remove_mark(&repo, MarkKind::Favorite, cook.id, soup).unwrap();
    assert!(matches!(
        toggle::remove_mark(&repo, MarkKind::Favorite, cook.id, soup),
        Err(ServiceError::NotFound(NotFoundError::EntryNotFound))
    ));
}

#[test]
fn marks_on_missing_recipes_are_not_found() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();

    assert!(matches!(
        toggle::add_mark(&repo, MarkKind::ShoppingCart, cook.id, 404),
        Err(ServiceError::NotFound(NotFoundError::UnknownRecipe(404)))
    ));
    assert!(matches!(
        toggle::remove_mark(&repo, MarkKind::ShoppingCart, cook.id, 404),
        Err(ServiceError::NotFound(NotFoundError::UnknownRecipe(404)))
    ));
}

#[test]
fn favorites_and_cart_are_independent() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    let salt = repo.add_ingredient("соль", "г").unwrap();
    let soup = recipe(&repo, cook.id, "Суп", &[(salt.id, 5)]);
    let stew = recipe(&repo, cook.id, "Рагу", &[(salt.id, 3)]);

    toggle::add_mark(&repo, MarkKind::Favorite, cook.id, soup).unwrap();
    toggle::add_mark(&repo, MarkKind::ShoppingCart, cook.id, stew).unwrap();

    let favorites = RecipeQuery {
        is_favorited: true,
        ..RecipeQuery::default()
    };
    let found = recipes::list_recipes(
        &repo,
        Some(cook.id),
        favorites.clone(),
        PageRequest::new(1, 6),
    )
    .unwrap();
    assert_eq!(
        found.results.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![soup]
    );

    // anonymous callers have no favorites, the flag is ignored
    let anonymous = recipes::list_recipes(&repo, None, favorites, PageRequest::new(1, 6)).unwrap();
    assert_eq!(anonymous.count, 2);

    let cart = RecipeQuery {
        is_in_shopping_cart: true,
        ..RecipeQuery::default()
    };
    let found = recipes::list_recipes(&repo, Some(cook.id), cart, PageRequest::new(1, 6)).unwrap();
    assert_eq!(
        found.results.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![stew]
    );
}

#[test]
fn shopping_list_merges_amounts_across_recipes() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    let salt = repo.add_ingredient("salt", "g").unwrap();
    let flour = repo.add_ingredient("flour", "g").unwrap();
    let eggs = repo.add_ingredient("eggs", "pcs").unwrap();
    let bread = recipe(&repo, cook.id, "Bread", &[(salt.id, 10), (flour.id, 500)]);
    let omelette = recipe(&repo, cook.id, "Omelette", &[(salt.id, 15), (eggs.id, 3)]);

    toggle::add_mark(&repo, MarkKind::ShoppingCart, cook.id, bread).unwrap();
    toggle::add_mark(&repo, MarkKind::ShoppingCart, cook.id, omelette).unwrap();

    let document = shopping_list::shopping_list(&repo, cook.id).unwrap();
    assert_eq!(document, "Eggs: 3 pcs\nFlour: 500 g\nSalt: 25 g");
}

#[test]
fn empty_cart_renders_an_empty_document() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    assert_eq!(shopping_list::shopping_list(&repo, cook.id).unwrap(), "");
}

#[test]
fn deleted_recipe_leaves_the_cart() {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    let salt = repo.add_ingredient("salt", "g").unwrap();
    let soup = recipe(&repo, cook.id, "Soup", &[(salt.id, 5)]);
    toggle::add_mark(&repo, MarkKind::ShoppingCart, cook.id, soup).unwrap();

    recipes::delete_recipe(&repo, Actor::user(cook.id), soup).unwrap();
    assert_eq!(shopping_list::shopping_list(&repo, cook.id).unwrap(), "");
}
