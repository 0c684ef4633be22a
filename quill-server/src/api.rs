//! JSON API endpoints
//!
//! Listing endpoints take `?page=N` and answer `{"page": {...}, "<items>": [...]}`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use quill_orm::{parse_page_index, Database, Entity, Page, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::models::{Blog, Comment, Image, User};

/// Page size of the image gallery
pub const IMAGE_PAGE_SIZE: u64 = 6;

/// Error body: `{"error": kind, "data": field, "message": text}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Invalid { field: String, message: String },

    #[error("{message}")]
    NotFound { resource: String, message: String },

    #[error(transparent)]
    Internal(#[from] quill_orm::Error),
}

impl ApiError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn not_found(resource: &str, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, data) = match &self {
            ApiError::Invalid { field, .. } => (StatusCode::BAD_REQUEST, "value:invalid", field.clone()),
            ApiError::NotFound { resource, .. } => {
                (StatusCode::NOT_FOUND, "value:notfound", resource.clone())
            }
            ApiError::Internal(error) => {
                error!(%error, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", String::new())
            }
        };

        (
            status,
            Json(json!({
                "error": kind,
                "data": data,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    page: Option<String>,
}

impl PageParams {
    fn index(&self) -> u64 {
        parse_page_index(self.page.as_deref().unwrap_or("1"))
    }
}

/// Count, window and fetch one page, newest first
async fn newest_page<E: Entity>(
    database: &Database,
    page_index: u64,
    page_size: u64,
) -> Result<(Page, Vec<E>), ApiError> {
    let count = database.count_rows::<E>(None, &[]).await?;
    let page = Page::new(count, page_index, page_size);
    if page.is_empty() {
        return Ok((page, Vec::new()));
    }

    let items = database
        .find_all(Query::new().order_by("created_at desc").limit(&page))
        .await?;
    Ok((page, items))
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(field, format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

async fn find_blog(database: &Database, blog_id: &str) -> Result<Blog, ApiError> {
    database
        .find_by_id::<Blog>(blog_id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", format!("blog {} does not exist", blog_id)))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    pool: quill_orm::PoolStatus,
}

/// Handler for GET /api/health
///
/// Runs `SELECT 1` and reports the pool occupancy.
pub async fn health_handler(
    State(database): State<Database>,
) -> Result<Json<HealthResponse>, StatusCode> {
    database
        .select("SELECT 1", &[], Some(1))
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ok",
        pool: database.status(),
    }))
}

#[derive(Serialize)]
pub struct UsersResponse {
    page: Page,
    users: Vec<User>,
}

/// Handler for GET /api/users
///
/// Password hashes are masked.
pub async fn list_users_handler(
    State(database): State<Database>,
    axum::extract::Query(params): axum::extract::Query<PageParams>,
) -> ApiResult<UsersResponse> {
    let (page, users) = newest_page::<User>(&database, params.index(), Page::DEFAULT_SIZE).await?;
    Ok(Json(UsersResponse {
        page,
        users: users.into_iter().map(User::masked).collect(),
    }))
}

#[derive(Serialize)]
pub struct BlogsResponse {
    page: Page,
    blogs: Vec<Blog>,
}

/// Handler for GET /api/blogs
pub async fn list_blogs_handler(
    State(database): State<Database>,
    axum::extract::Query(params): axum::extract::Query<PageParams>,
) -> ApiResult<BlogsResponse> {
    let (page, blogs) = newest_page(&database, params.index(), Page::DEFAULT_SIZE).await?;
    Ok(Json(BlogsResponse { page, blogs }))
}

/// Handler for GET /api/blogs/{id}
pub async fn get_blog_handler(
    State(database): State<Database>,
    Path(blog_id): Path<String>,
) -> ApiResult<Blog> {
    Ok(Json(find_blog(&database, &blog_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBlog {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    user_image: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    content: String,
}

/// Handler for POST /api/blogs
///
/// The author fields are taken from the body; there is no session layer.
pub async fn create_blog_handler(
    State(database): State<Database>,
    Json(body): Json<CreateBlog>,
) -> ApiResult<Blog> {
    let mut blog = Blog {
        user_id: body.user_id,
        user_name: body.user_name,
        user_image: body.user_image,
        name: required("name", &body.name)?,
        summary: required("summary", &body.summary)?,
        content: required("content", &body.content)?,
        ..Blog::default()
    };
    database.save(&mut blog).await?;
    Ok(Json(blog))
}

#[derive(Debug, Deserialize)]
pub struct EditBlog {
    #[serde(default)]
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    content: String,
}

/// Handler for POST /api/blogs/{id}
pub async fn update_blog_handler(
    State(database): State<Database>,
    Path(blog_id): Path<String>,
    Json(body): Json<EditBlog>,
) -> ApiResult<Blog> {
    let mut blog = find_blog(&database, &blog_id).await?;
    blog.name = required("name", &body.name)?;
    blog.summary = required("summary", &body.summary)?;
    blog.content = required("content", &body.content)?;
    database.update(&blog).await?;
    Ok(Json(blog))
}

/// Handler for POST /api/blogs/{id}/delete
pub async fn delete_blog_handler(
    State(database): State<Database>,
    Path(blog_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let blog = find_blog(&database, &blog_id).await?;
    database.remove(&blog).await?;
    Ok(Json(json!({ "id": blog_id })))
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    user_image: String,
    #[serde(default)]
    content: String,
}

/// Handler for POST /api/blogs/{id}/comments
pub async fn create_comment_handler(
    State(database): State<Database>,
    Path(blog_id): Path<String>,
    Json(body): Json<CreateComment>,
) -> ApiResult<Comment> {
    let content = required("content", &body.content)?;
    let blog = find_blog(&database, &blog_id).await?;

    let mut comment = Comment {
        blog_id: blog.id.unwrap_or(blog_id),
        user_id: body.user_id,
        user_name: body.user_name,
        user_image: body.user_image,
        content,
        ..Comment::default()
    };
    database.save(&mut comment).await?;
    Ok(Json(comment))
}

#[derive(Serialize)]
pub struct CommentsResponse {
    page: Page,
    comments: Vec<Comment>,
}

/// Handler for GET /api/comments
pub async fn list_comments_handler(
    State(database): State<Database>,
    axum::extract::Query(params): axum::extract::Query<PageParams>,
) -> ApiResult<CommentsResponse> {
    let (page, comments) = newest_page(&database, params.index(), Page::DEFAULT_SIZE).await?;
    Ok(Json(CommentsResponse { page, comments }))
}

/// Handler for POST /api/comments/{id}/delete
pub async fn delete_comment_handler(
    State(database): State<Database>,
    Path(comment_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let comment = database
        .find_by_id::<Comment>(comment_id.as_str())
        .await?
        .ok_or_else(|| {
            ApiError::not_found("comment", format!("comment {} does not exist", comment_id))
        })?;
    database.remove(&comment).await?;
    Ok(Json(json!({ "id": comment_id })))
}

#[derive(Serialize)]
pub struct ImagesResponse {
    page: Page,
    images: Vec<Image>,
}

/// Handler for GET /api/images
pub async fn list_images_handler(
    State(database): State<Database>,
    axum::extract::Query(params): axum::extract::Query<PageParams>,
) -> ApiResult<ImagesResponse> {
    let (page, images) = newest_page(&database, params.index(), IMAGE_PAGE_SIZE).await?;
    Ok(Json(ImagesResponse { page, images }))
}

#[derive(Debug, Deserialize)]
pub struct CreateImage {
    #[serde(default)]
    url: String,
}

/// Handler for POST /api/images
///
/// Records an already hosted image by URL.
pub async fn create_image_handler(
    State(database): State<Database>,
    Json(body): Json<CreateImage>,
) -> ApiResult<Image> {
    let mut image = Image {
        url: required("url", &body.url)?,
        ..Image::default()
    };
    database.save(&mut image).await?;
    Ok(Json(image))
}

/// Create the application router with all endpoints
///
/// # Arguments
///
/// * `database` - Shared database handle with the blog entities registered
pub fn create_router(database: Database) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/users", get(list_users_handler))
        .route("/api/blogs", get(list_blogs_handler).post(create_blog_handler))
        .route("/api/blogs/{id}", get(get_blog_handler).post(update_blog_handler))
        .route("/api/blogs/{id}/delete", post(delete_blog_handler))
        .route("/api/blogs/{id}/comments", post(create_comment_handler))
        .route("/api/comments", get(list_comments_handler))
        .route("/api/comments/{id}/delete", post(delete_comment_handler))
        .route("/api/images", get(list_images_handler).post(create_image_handler))
        .with_state(database)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
