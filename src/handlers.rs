use actix_web::{delete, get, http::header, patch, post, web, HttpRequest, HttpResponse};
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, StateMachine};
use serde::Serialize;

use crate::{
    cache::{self, RedisPool},
    catalog,
    config::Config,
    dto::{CreateRecipe, ListParams, PageEnvelope, UpdateRecipe},
    error::ServiceError,
    identity::Caller,
    models::{IngredientId, MarkKind, Paged, RecipeId, TagId, UserId},
    query::{DbPool, MysqlRepository},
    recipes, shopping_list, subscriptions, toggle,
};

pub type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

/// Runs one unit of storage work on the blocking pool, behind the circuit
/// breaker. Only backend faults count as breaker failures.
async fn storage<F, T>(
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(&MysqlRepository<'_>) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || {
        if !circuit_breaker.is_call_permitted() {
            return Err(ServiceError::Unavailable(
                "database circuit is open".to_string(),
            ));
        }
        let conn = pool.get()?;
        let repo = MysqlRepository::new(&conn);
        match circuit_breaker.call_with(ServiceError::is_storage_failure, || work(&repo)) {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(ServiceError::Unavailable(
                "database circuit is open".to_string(),
            )),
        }
    })
    .await?
}

fn list_params(req: &HttpRequest) -> Result<ListParams, ServiceError> {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
    ListParams::from_pairs(pairs.into_inner())
}

fn page_response<T: Serialize>(req: &HttpRequest, paged: Paged<T>) -> HttpResponse {
    let info = req.connection_info();
    let base = format!("{}://{}{}", info.scheme(), info.host(), req.path());
    HttpResponse::Ok().json(PageEnvelope::from_paged(paged, &base, req.query_string()))
}

pub fn shopping_list_response(document: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", shopping_list::FILE_NAME),
        ))
        .body(document)
}

/// Turns body and query-string decoding failures into JSON 400 answers.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(10 * 1024 * 1024)
        .error_handler(|err, _req| ServiceError::BadRequest(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ServiceError::BadRequest(err.to_string()).into())
}

#[derive(serde::Deserialize)]
pub struct IngredientSearch {
    name: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct RecipesLimit {
    recipes_limit: Option<i64>,
}

#[get("/api/tags/")]
async fn list_tags(
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let tags = storage(pool, circuit_breaker, |repo| catalog::list_tags(repo)).await?;
    Ok(HttpResponse::Ok().json(tags))
}

#[get("/api/tags/{id}/")]
async fn get_tag(
    id: web::Path<TagId>,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let tag = storage(pool, circuit_breaker, move |repo| {
        catalog::get_tag(repo, id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(tag))
}

#[get("/api/ingredients/")]
async fn list_ingredients(
    search: web::Query<IngredientSearch>,
    redis_pool: web::Data<RedisPool>,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    //first check if the catalog is in redis
    let cache_pool = redis_pool.clone();
    let ingredients = match web::block(move || cache::cached_catalog(&cache_pool)).await? {
        Some(ingredients) => ingredients,
        None => {
            //if cache does not exist, query the db but cache the result afterwards
            let ingredients = storage(pool, circuit_breaker, |repo| {
                catalog::ingredient_catalog(repo)
            })
            .await?;
            let snapshot = ingredients.clone();
            let ttl = config.cache_ttl_seconds;
            web::block(move || cache::store_catalog(&redis_pool, &snapshot, ttl)).await?;
            ingredients
        }
    };
    Ok(HttpResponse::Ok().json(catalog::search(ingredients, search.name.as_deref())))
}

#[get("/api/ingredients/{id}/")]
async fn get_ingredient(
    id: web::Path<IngredientId>,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let ingredient = storage(pool, circuit_breaker, move |repo| {
        catalog::get_ingredient(repo, id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ingredient))
}

#[get("/api/recipes/")]
async fn list_recipes(
    req: HttpRequest,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    let params = list_params(&req)?;
    let page = params.page_request(config.page_size);
    let viewer = caller.user_id();
    let recipes = storage(pool, circuit_breaker, move |repo| {
        recipes::list_recipes(repo, viewer, params.recipes, page)
    })
    .await?;
    Ok(page_response(&req, recipes))
}

#[post("/api/recipes/")]
async fn create_recipe(
    caller: Caller,
    body: web::Json<CreateRecipe>,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let author = caller.require()?.id;
    let input = body.into_inner();
    let recipe = storage(pool, circuit_breaker, move |repo| {
        recipes::create_recipe(repo, author, input)
    })
    .await?;
    Ok(HttpResponse::Created().json(recipe))
}

#[get("/api/recipes/download_shopping_cart/")]
async fn download_shopping_cart(
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let user = caller.require()?.id;
    let document = storage(pool, circuit_breaker, move |repo| {
        shopping_list::shopping_list(repo, user)
    })
    .await?;
    Ok(shopping_list_response(document))
}

#[get("/api/recipes/{id}/")]
async fn get_recipe(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let viewer = caller.user_id();
    let recipe = storage(pool, circuit_breaker, move |repo| {
        recipes::get_recipe(repo, viewer, id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(recipe))
}

#[patch("/api/recipes/{id}/")]
async fn update_recipe(
    id: web::Path<RecipeId>,
    caller: Caller,
    body: web::Json<UpdateRecipe>,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let actor = caller.require()?;
    let id = id.into_inner();
    let input = body.into_inner();
    let recipe = storage(pool, circuit_breaker, move |repo| {
        recipes::update_recipe(repo, actor, id, input)
    })
    .await?;
    Ok(HttpResponse::Ok().json(recipe))
}

#[delete("/api/recipes/{id}/")]
async fn delete_recipe(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let actor = caller.require()?;
    let id = id.into_inner();
    storage(pool, circuit_breaker, move |repo| {
        recipes::delete_recipe(repo, actor, id)
    })
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn add_mark(
    kind: MarkKind,
    id: RecipeId,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let user = caller.require()?.id;
    let recipe = storage(pool, circuit_breaker, move |repo| {
        toggle::add_mark(repo, kind, user, id)
    })
    .await?;
    Ok(HttpResponse::Created().json(recipe))
}

async fn remove_mark(
    kind: MarkKind,
    id: RecipeId,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let user = caller.require()?.id;
    storage(pool, circuit_breaker, move |repo| {
        toggle::remove_mark(repo, kind, user, id)
    })
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/api/recipes/{id}/favorite/")]
async fn add_favorite(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    add_mark(
        MarkKind::Favorite,
        id.into_inner(),
        caller,
        pool,
        circuit_breaker,
    )
    .await
}

#[delete("/api/recipes/{id}/favorite/")]
async fn remove_favorite(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    remove_mark(
        MarkKind::Favorite,
        id.into_inner(),
        caller,
        pool,
        circuit_breaker,
    )
    .await
}

#[post("/api/recipes/{id}/shopping_cart/")]
async fn add_to_cart(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    add_mark(
        MarkKind::ShoppingCart,
        id.into_inner(),
        caller,
        pool,
        circuit_breaker,
    )
    .await
}

#[delete("/api/recipes/{id}/shopping_cart/")]
async fn remove_from_cart(
    id: web::Path<RecipeId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    remove_mark(
        MarkKind::ShoppingCart,
        id.into_inner(),
        caller,
        pool,
        circuit_breaker,
    )
    .await
}

#[get("/api/users/subscriptions/")]
async fn list_subscriptions(
    req: HttpRequest,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    let follower = caller.require()?.id;
    let params = list_params(&req)?;
    let page = params.page_request(config.page_size);
    let recipes_limit = params.recipes_limit;
    let authors = storage(pool, circuit_breaker, move |repo| {
        subscriptions::list_subscriptions(repo, follower, page, recipes_limit)
    })
    .await?;
    Ok(page_response(&req, authors))
}

#[post("/api/users/{id}/subscribe/")]
async fn subscribe(
    id: web::Path<UserId>,
    limit: web::Query<RecipesLimit>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let follower = caller.require()?.id;
    let author = id.into_inner();
    let recipes_limit = limit.recipes_limit;
    let subscription = storage(pool, circuit_breaker, move |repo| {
        subscriptions::subscribe(repo, follower, author, recipes_limit)
    })
    .await?;
    Ok(HttpResponse::Created().json(subscription))
}

#[delete("/api/users/{id}/subscribe/")]
async fn unsubscribe(
    id: web::Path<UserId>,
    caller: Caller,
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
) -> Result<HttpResponse, ServiceError> {
    let follower = caller.require()?.id;
    let author = id.into_inner();
    storage(pool, circuit_breaker, move |repo| {
        subscriptions::unsubscribe(repo, follower, author)
    })
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Registers every endpoint. The shopping-list download must precede
/// `/api/recipes/{id}/`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_tags)
        .service(get_tag)
        .service(list_ingredients)
        .service(get_ingredient)
        .service(download_shopping_cart)
        .service(list_recipes)
        .service(create_recipe)
        .service(get_recipe)
        .service(update_recipe)
        .service(delete_recipe)
        .service(add_favorite)
        .service(remove_favorite)
        .service(add_to_cart)
        .service(remove_from_cart)
        .service(list_subscriptions)
        .service(subscribe)
        .service(unsubscribe);
}

#[cfg(test)]
mod tests {
    use actix_web::{body::to_bytes, http::StatusCode, test, App, HttpResponse};

    use super::*;

    #[actix_web::test]
    async fn shopping_list_is_a_text_attachment() {
        let resp = shopping_list_response("Salt: 25 g".to_string());

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"shopping_list.txt\""
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Salt: 25 g");
    }

    #[derive(serde::Deserialize)]
    struct Probe {
        #[allow(dead_code)]
        cooking_time: i64,
    }

    async fn probe(_body: web::Json<Probe>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn malformed_json_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(json_config())
                .route("/probe", web::post().to(probe)),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/probe")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload(r#"{"cooking_time": "soon"}"#)
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["errors"]
            .as_str()
            .unwrap()
            .starts_with("Malformed request"));
    }

    #[actix_web::test]
    async fn protected_endpoint_rejects_anonymous_callers() {
        async fn whoami(caller: Caller) -> Result<HttpResponse, ServiceError> {
            let actor = caller.require()?;
            Ok(HttpResponse::Ok().json(actor.id))
        }

        let app = test::init_service(App::new().route("/me", web::get().to(whoami))).await;

        let anonymous = test::TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, anonymous).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let signed_in = test::TestRequest::get()
            .uri("/me")
            .insert_header((crate::identity::USER_ID_HEADER, "5"))
            .to_request();
        let resp = test::call_service(&app, signed_in).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
