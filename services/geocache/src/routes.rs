//! Geocache service routes

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    error::{ApiError, ApiResult},
    extract::{IdPath, JsonBody},
    models::{
        Cache, CacheFilter, CacheSummary, CacheView, CreateCacheRequest, NewCache, NewUser,
        RegisterUserRequest, User, UserView, today,
    },
    repositories::GeocacheRepository,
    response,
    state::AppState,
};

/// Request naming the cache to associate with a user
#[derive(Debug, Deserialize)]
pub struct CacheRefRequest {
    pub cache_id: Option<i64>,
}

/// Create the router for the geocache service
///
/// `POST /caches/:key/completed/` and `/favorited/` are category listings
/// whose item is literally `completed` or `favorited`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health/", get(health_check).fallback(method_not_allowed))
        .route(
            "/users/",
            get(get_users)
                .post(create_user)
                .fallback(method_not_allowed),
        )
        .route(
            "/users/:id/",
            get(get_user)
                .delete(delete_user)
                .fallback(method_not_allowed),
        )
        .route("/caches/", get(get_caches).fallback(method_not_allowed))
        .route(
            "/caches/:key/",
            get(get_caches_by_creator)
                .post(create_cache)
                .delete(delete_cache)
                .fallback(method_not_allowed),
        )
        .route(
            "/caches/:key/completed/",
            get(get_completed_caches)
                .post(get_caches_completed_item)
                .fallback(method_not_allowed),
        )
        .route(
            "/caches/:key/favorited/",
            get(get_favorited_caches)
                .post(get_caches_favorited_item)
                .fallback(method_not_allowed),
        )
        .route(
            "/caches/:key/completed/add/",
            post(add_completed_cache).fallback(method_not_allowed),
        )
        .route(
            "/caches/:key/favorited/add/",
            post(add_favorited_cache).fallback(method_not_allowed),
        )
        .route(
            "/caches/:key/:item/",
            post(get_caches_by_category).fallback(method_not_allowed),
        )
        .fallback(route_not_found)
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.repository.health_check().await {
        Ok(true) => response::success(json!({
            "status": "ok",
            "service": "geocache"
        })),
        Ok(false) => response::failure("Storage unavailable", StatusCode::SERVICE_UNAVAILABLE),
        Err(e) => {
            error!("Storage health check failed: {}", e);
            response::failure("Storage unavailable", StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn summaries(caches: Vec<Cache>) -> Vec<CacheSummary> {
    caches.iter().map(Cache::summary).collect()
}

fn views(caches: Vec<Cache>) -> Vec<CacheView> {
    caches.into_iter().map(CacheView::from).collect()
}

/// Resolve the caches a user created, completed and favorited
async fn user_view(repository: &dyn GeocacheRepository, user: User) -> ApiResult<UserView> {
    let created = summaries(repository.list_caches_by_creator(&user.username).await?);
    let completed = summaries(repository.list_completed(user.id).await?);
    let favorited = summaries(repository.list_favorited(user.id).await?);

    Ok(user.into_view(created, completed, favorited))
}

async fn find_user(repository: &dyn GeocacheRepository, id: i64) -> ApiResult<User> {
    repository
        .find_user(id)
        .await?
        .ok_or(ApiError::NotFound("User"))
}

async fn find_cache(repository: &dyn GeocacheRepository, id: i64) -> ApiResult<Cache> {
    repository
        .find_cache(id)
        .await?
        .ok_or(ApiError::NotFound("Cache"))
}

// -- User routes ------------------------------------------------------

/// Get all users
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Response> {
    let repository = state.repository.as_ref();

    let mut users = Vec::new();
    for user in repository.list_users().await? {
        users.push(user_view(repository, user).await?);
    }

    Ok(response::success(json!({ "users": users })))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, id).await?;

    Ok(response::success(user_view(repository, user).await?))
}

/// Register a new user
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterUserRequest>,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let new_user = NewUser::register(payload)?;

    info!("Registering user: {}", new_user.username);

    if repository
        .find_user_by_username(&new_user.username)
        .await?
        .is_some()
    {
        warn!("Username already taken: {}", new_user.username);
        return Err(ApiError::Conflict("Username already taken!".to_string()));
    }

    if repository
        .find_user_by_email(&new_user.email)
        .await?
        .is_some()
    {
        warn!("Email already taken for user: {}", new_user.username);
        return Err(ApiError::Conflict("Email already taken!".to_string()));
    }

    let user = repository.create_user(&new_user).await?;

    Ok(response::created(user_view(repository, user).await?))
}

/// Delete a user by ID
pub async fn delete_user(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, id).await?;

    info!("Deleting user: {}", user.username);

    // Captured before the delete cascades to the user's caches.
    let view = user_view(repository, user).await?;

    repository
        .delete_user(id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(response::success(view))
}

// -- Cache routes -----------------------------------------------------

/// Get all caches
pub async fn get_caches(State(state): State<AppState>) -> ApiResult<Response> {
    let caches = views(state.repository.list_caches().await?);

    Ok(response::success(json!({ "caches": caches })))
}

/// Get all caches a user created
pub async fn get_caches_by_creator(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();

    let user = repository
        .find_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let caches = views(repository.list_caches_by_creator(&user.username).await?);

    Ok(response::success(json!({ "caches": caches })))
}

/// Get all caches a user completed
pub async fn get_completed_caches(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, user_id).await?;

    let caches = views(repository.list_completed(user.id).await?);

    Ok(response::success(json!({ "completed_caches": caches })))
}

/// Get all caches a user favorited
pub async fn get_favorited_caches(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, user_id).await?;

    let caches = views(repository.list_favorited(user.id).await?);

    Ok(response::success(json!({ "favorite_caches": caches })))
}

/// Get caches whose `category` attribute equals `item`
pub async fn get_caches_by_category(
    State(state): State<AppState>,
    Path((category, item)): Path<(String, String)>,
) -> ApiResult<Response> {
    list_caches_by_category(state.repository.as_ref(), &category, &item).await
}

/// Category listing for the item `completed`, whose path the completed listing shares
pub async fn get_caches_completed_item(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Response> {
    list_caches_by_category(state.repository.as_ref(), &category, "completed").await
}

/// Category listing for the item `favorited`, whose path the favorited listing shares
pub async fn get_caches_favorited_item(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Response> {
    list_caches_by_category(state.repository.as_ref(), &category, "favorited").await
}

async fn list_caches_by_category(
    repository: &dyn GeocacheRepository,
    category: &str,
    item: &str,
) -> ApiResult<Response> {
    let filter = CacheFilter::parse(category, item)?;

    let caches = views(repository.list_caches_matching(&filter).await?);

    Ok(response::success(json!({ "caches": caches })))
}

/// Create a cache owned by a user
pub async fn create_cache(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
    JsonBody(payload): JsonBody<CreateCacheRequest>,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, user_id).await?;

    let new_cache = NewCache::create(payload, &user)?;
    let cache = repository.create_cache(&new_cache).await?;

    info!("Created cache {} for {}", cache.id, user.username);

    Ok(response::created(CacheView::from(cache)))
}

/// Mark a cache as found by a user
pub async fn add_completed_cache(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
    JsonBody(payload): JsonBody<CacheRefRequest>,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, user_id).await?;
    let cache_id = payload
        .cache_id
        .ok_or_else(|| ApiError::Validation("Enter valid cache!".to_string()))?;
    let cache = find_cache(repository, cache_id).await?;

    info!("User {} completed cache {}", user.username, cache.id);

    let cache = repository.add_completed(user.id, cache.id, &today()).await?;

    Ok(response::success(CacheView::from(cache)))
}

/// Add a cache to a user's favorites
pub async fn add_favorited_cache(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
    JsonBody(payload): JsonBody<CacheRefRequest>,
) -> ApiResult<Response> {
    let repository = state.repository.as_ref();
    let user = find_user(repository, user_id).await?;
    let cache_id = payload
        .cache_id
        .ok_or_else(|| ApiError::Validation("Enter valid cache!".to_string()))?;
    let cache = find_cache(repository, cache_id).await?;

    info!("User {} favorited cache {}", user.username, cache.id);

    let cache = repository.add_favorite(user.id, cache.id).await?;

    Ok(response::success(CacheView::from(cache)))
}

/// Delete a cache by ID
pub async fn delete_cache(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    let cache = state
        .repository
        .delete_cache(id)
        .await?
        .ok_or(ApiError::NotFound("Cache"))?;

    info!("Deleted cache {}", cache.id);

    Ok(response::success(CacheView::from(cache)))
}
