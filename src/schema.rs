table! {
    users (id) {
        id -> Int4,
        email -> Varchar,
        username -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
    }
}

table! {
    tags (id) {
        id -> Int4,
        name -> Varchar,
        color -> Varchar,
        slug -> Varchar,
    }
}

table! {
    ingredients (id) {
        id -> Int4,
        name -> Varchar,
        measurement_unit -> Varchar,
    }
}

table! {
    use diesel::sql_types::*;
    use diesel::mysql::types::Unsigned;

    recipes (id) {
        id -> Int4,
        author_id -> Int4,
        name -> Varchar,
        image -> Text,
        text -> Text,
        cooking_time -> Unsigned<Integer>,
        created_at -> Timestamp,
    }
}

table! {
    recipe_tags (recipe_id, tag_id) {
        recipe_id -> Int4,
        tag_id -> Int4,
    }
}

table! {
    use diesel::sql_types::*;
    use diesel::mysql::types::Unsigned;

    recipe_ingredients (recipe_id, ingredient_id) {
        recipe_id -> Int4,
        ingredient_id -> Int4,
        amount -> Unsigned<Integer>,
    }
}

table! {
    favorites (user_id, recipe_id) {
        user_id -> Int4,
        recipe_id -> Int4,
    }
}

table! {
    shopping_carts (user_id, recipe_id) {
        user_id -> Int4,
        recipe_id -> Int4,
    }
}

table! {
    subscriptions (follower_id, author_id) {
        follower_id -> Int4,
        author_id -> Int4,
    }
}

joinable!(recipes -> users (author_id));
joinable!(recipe_tags -> recipes (recipe_id));
joinable!(recipe_tags -> tags (tag_id));
joinable!(recipe_ingredients -> recipes (recipe_id));
joinable!(recipe_ingredients -> ingredients (ingredient_id));
joinable!(favorites -> recipes (recipe_id));
joinable!(shopping_carts -> recipes (recipe_id));

allow_tables_to_appear_in_same_query!(
    users,
    tags,
    ingredients,
    recipes,
    recipe_tags,
    recipe_ingredients,
    favorites,
    shopping_carts,
    subscriptions,
);
