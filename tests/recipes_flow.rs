use foodgram::{
    dto::{CreateRecipe, IngredientAmountInput, RecipeQuery, UpdateRecipe},
    error::{NotFoundError, ServiceError, ValidationError},
    memory::InMemoryRepository,
    models::{Actor, Ingredient, PageRequest, Tag, User},
    recipes,
};

struct Kitchen {
    repo: InMemoryRepository,
    cook: User,
    guest: User,
    salt: Ingredient,
    flour: Ingredient,
    breakfast: Tag,
    dinner: Tag,
}

fn kitchen() -> Kitchen {
    let repo = InMemoryRepository::new();
    let cook = repo.add_user("cook").unwrap();
    let guest = repo.add_user("guest").unwrap();
    let salt = repo.add_ingredient("соль", "г").unwrap();
    let flour = repo.add_ingredient("мука", "г").unwrap();
    let breakfast = repo.add_tag("Завтрак", "#E26C2D", "breakfast").unwrap();
    let dinner = repo.add_tag("Ужин", "#8775D2", "dinner").unwrap();
    Kitchen {
        repo,
        cook,
        guest,
        salt,
        flour,
        breakfast,
        dinner,
    }
}

fn amount(ingredient: &Ingredient, amount: i64) -> IngredientAmountInput {
    IngredientAmountInput {
        id: ingredient.id,
        amount,
    }
}

fn pancakes(k: &Kitchen) -> CreateRecipe {
    CreateRecipe {
        ingredients: vec![amount(&k.flour, 200), amount(&k.salt, 5)],
        tags: vec![k.breakfast.id],
        image: Some("data:image/png;base64,AAAA".to_string()),
        name: "Блины".to_string(),
        text: "Смешать и жарить".to_string(),
        cooking_time: 30,
    }
}

fn page() -> PageRequest {
    PageRequest::new(1, 6)
}

#[test]
fn create_returns_the_full_read_model() {
    let k = kitchen();
    let recipe = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();

    assert_eq!(recipe.name, "Блины");
    assert_eq!(recipe.author.id, k.cook.id);
    assert!(!recipe.author.is_subscribed);
    assert_eq!(recipe.tags, vec![k.breakfast.clone()]);
    let amounts: Vec<_> = recipe
        .ingredients
        .iter()
        .map(|item| (item.name.as_str(), item.amount))
        .collect();
    assert_eq!(amounts.len(), 2);
    assert!(amounts.contains(&("мука", 200)));
    assert!(amounts.contains(&("соль", 5)));
    assert!(!recipe.is_favorited);
    assert!(!recipe.is_in_shopping_cart);
}

#[test]
fn invalid_ingredients_are_rejected_before_storage() {
    let k = kitchen();

    let mut empty = pancakes(&k);
    empty.ingredients.clear();
    assert!(matches!(
        recipes::create_recipe(&k.repo, k.cook.id, empty),
        Err(ServiceError::Validation(ValidationError::EmptyIngredients))
    ));

    let mut zero = pancakes(&k);
    zero.ingredients = vec![amount(&k.salt, 0)];
    assert!(matches!(
        recipes::create_recipe(&k.repo, k.cook.id, zero),
        Err(ServiceError::Validation(ValidationError::InvalidQuantity {
            amount: 0,
            ..
        }))
    ));

    let mut twice = pancakes(&k);
    twice.ingredients = vec![amount(&k.salt, 5), amount(&k.salt, 10)];
    assert!(matches!(
        recipes::create_recipe(&k.repo, k.cook.id, twice),
        Err(ServiceError::Validation(ValidationError::DuplicateIngredient(id))) if id == k.salt.id
    ));

    let listed = recipes::list_recipes(&k.repo, None, RecipeQuery::default(), page()).unwrap();
    assert_eq!(listed.count, 0);
}

#[test]
fn unknown_references_are_not_found() {
    let k = kitchen();

    let mut missing_ingredient = pancakes(&k);
    missing_ingredient.ingredients.push(IngredientAmountInput {
        id: 9_999,
        amount: 1,
    });
    assert!(matches!(
        recipes::create_recipe(&k.repo, k.cook.id, missing_ingredient),
        Err(ServiceError::NotFound(NotFoundError::UnknownIngredient(
            9_999
        )))
    ));

    let mut missing_tag = pancakes(&k);
    missing_tag.tags.push(4_242);
    assert!(matches!(
        recipes::create_recipe(&k.repo, k.cook.id, missing_tag),
        Err(ServiceError::NotFound(NotFoundError::UnknownTag(4_242)))
    ));
}

#[test]
fn update_replaces_associations_and_keeps_omitted_fields() {
    let k = kitchen();
    let created = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();

    let update = UpdateRecipe {
        ingredients: vec![amount(&k.salt, 7)],
        tags: Some(vec![k.dinner.id]),
        image: None,
        name: None,
        text: Some("Жарить дольше".to_string()),
        cooking_time: Some(45),
    };
    let updated =
        recipes::update_recipe(&k.repo, Actor::user(k.cook.id), created.id, update).unwrap();

    assert_eq!(updated.name, "Блины");
    assert_eq!(updated.image, created.image);
    assert_eq!(updated.text, "Жарить дольше");
    assert_eq!(updated.cooking_time, 45);
    assert_eq!(updated.tags, vec![k.dinner.clone()]);
    assert_eq!(updated.ingredients.len(), 1);
    assert_eq!(updated.ingredients[0].id, k.salt.id);
    assert_eq!(updated.ingredients[0].amount, 7);
}

#[test]
fn update_without_tags_keeps_them() {
    let k = kitchen();
    let created = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();

    let body = format!(
        r#"{{"ingredients":[{{"id":{},"amount":7}}],"name":"Блины 2"}}"#,
        k.salt.id
    );
    let update: UpdateRecipe = serde_json::from_str(&body).unwrap();
    assert_eq!(update.tags, None);

    let updated =
        recipes::update_recipe(&k.repo, Actor::user(k.cook.id), created.id, update).unwrap();
    assert_eq!(updated.name, "Блины 2");
    assert_eq!(updated.tags, vec![k.breakfast.clone()]);
    assert_eq!(updated.ingredients.len(), 1);

    let cleared: UpdateRecipe = serde_json::from_str(&format!(
        r#"{{"ingredients":[{{"id":{},"amount":7}}],"tags":[]}}"#,
        k.salt.id
    ))
    .unwrap();
    let updated =
        recipes::update_recipe(&k.repo, Actor::user(k.cook.id), created.id, cleared).unwrap();
    assert!(updated.tags.is_empty());
}

#[test]
fn failed_update_leaves_the_recipe_untouched() {
    let k = kitchen();
    let created = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();

    let update = UpdateRecipe {
        ingredients: vec![amount(&k.salt, 7), amount(&k.flour, 40_000)],
        tags: None,
        image: None,
        name: Some("Оладьи".to_string()),
        text: None,
        cooking_time: None,
    };
    assert!(matches!(
        recipes::update_recipe(&k.repo, Actor::user(k.cook.id), created.id, update),
        Err(ServiceError::Validation(ValidationError::InvalidQuantity {
            amount: 40_000,
            ..
        }))
    ));

    let stored = recipes::get_recipe(&k.repo, None, created.id).unwrap();
    assert_eq!(stored, created);
}

#[test]
fn only_author_or_admin_may_change_a_recipe() {
    let k = kitchen();
    let created = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();
    let update = UpdateRecipe {
        ingredients: vec![amount(&k.salt, 1)],
        tags: None,
        image: None,
        name: Some("Чужие блины".to_string()),
        text: None,
        cooking_time: None,
    };

    assert!(matches!(
        recipes::update_recipe(&k.repo, Actor::user(k.guest.id), created.id, update.clone()),
        Err(ServiceError::Forbidden)
    ));
    assert!(matches!(
        recipes::delete_recipe(&k.repo, Actor::user(k.guest.id), created.id),
        Err(ServiceError::Forbidden)
    ));

    let renamed =
        recipes::update_recipe(&k.repo, Actor::admin(k.guest.id), created.id, update).unwrap();
    assert_eq!(renamed.name, "Чужие блины");

    recipes::delete_recipe(&k.repo, Actor::user(k.cook.id), created.id).unwrap();
    assert!(matches!(
        recipes::get_recipe(&k.repo, None, created.id),
        Err(ServiceError::NotFound(NotFoundError::UnknownRecipe(_)))
    ));
    assert!(matches!(
        recipes::delete_recipe(&k.repo, Actor::user(k.cook.id), created.id),
        Err(ServiceError::NotFound(NotFoundError::UnknownRecipe(_)))
    ));
}

#[test]
fn list_filters_by_tag_and_author_newest_first() {
    let k = kitchen();
    let first = recipes::create_recipe(&k.repo, k.cook.id, pancakes(&k)).unwrap();
    let mut soup = pancakes(&k);
    soup.name = "Суп".to_string();
    soup.tags = vec![k.dinner.id];
    let second = recipes::create_recipe(&k.repo, k.guest.id, soup).unwrap();

    let all = recipes::list_recipes(&k.repo, None, RecipeQuery::default(), page()).unwrap();
    assert_eq!(all.count, 2);
    let ids: Vec<_> = all.results.iter().map(|recipe| recipe.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let dinners = RecipeQuery {
        tags: vec!["dinner".to_string()],
        ..RecipeQuery::default()
    };
    let found = recipes::list_recipes(&k.repo, None, dinners, page()).unwrap();
    assert_eq!(found.results.len(), 1);
    assert_eq!(found.results[0].id, second.id);

    let by_cook = RecipeQuery {
        author: Some(k.cook.id),
        ..RecipeQuery::default()
    };
    let found = recipes::list_recipes(&k.repo, None, by_cook, page()).unwrap();
    assert_eq!(found.count, 1);
    assert_eq!(found.results[0].id, first.id);
}

#[test]
fn list_pages_through_results() {
    let k = kitchen();
    for n in 0..5 {
        let mut recipe = pancakes(&k);
        recipe.name = format!("Блины {}", n);
        recipes::create_recipe(&k.repo, k.cook.id, recipe).unwrap();
    }

    let second = recipes::list_recipes(
        &k.repo,
        None,
        RecipeQuery::default(),
        PageRequest::new(2, 2),
    )
    .unwrap();
    assert_eq!(second.count, 5);
    assert_eq!(second.results.len(), 2);
    assert!(second.has_next());
    assert!(second.has_previous());

    let last = recipes::list_recipes(
        &k.repo,
        None,
        RecipeQuery::default(),
        PageRequest::new(3, 2),
    )
    .unwrap();
    assert_eq!(last.results.len(), 1);
    assert!(!last.has_next());
}
