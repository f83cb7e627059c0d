use crate::http::AppState;
use crate::http::handler::{ApiError, ApiSuccess, FieldErrors, parse_path_id};
use crate::models::{
    Author, AuthorName, AuthorSummary, Bio, Book, CreateAuthorError, CreateAuthorRequest,
    DeleteAuthorError, DeleteAuthorRequest, FindAllAuthorsError, FindAuthorError,
    FindAuthorRequest, UpdateAuthorError, UpdateAuthorRequest,
};
use crate::repositories::AuthorRepository;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

impl From<CreateAuthorError> for ApiError {
    fn from(err: CreateAuthorError) -> Self {
        Self::internal("AUTHOR_CREATE_FAILED", "failed to create author", &err.0)
    }
}

impl From<FindAuthorError> for ApiError {
    fn from(err: FindAuthorError) -> Self {
        match err {
            FindAuthorError::NotFound { .. } => {
                Self::not_found("AUTHOR_NOT_FOUND", "author not found")
            }
            FindAuthorError::Other(cause) => {
                Self::internal("AUTHOR_FETCH_FAILED", "failed to fetch author", &cause)
            }
        }
    }
}

impl From<FindAllAuthorsError> for ApiError {
    fn from(err: FindAllAuthorsError) -> Self {
        Self::internal("AUTHOR_LIST_FAILED", "failed to list authors", &err.0)
    }
}

impl From<UpdateAuthorError> for ApiError {
    fn from(err: UpdateAuthorError) -> Self {
        match err {
            UpdateAuthorError::NotFound { .. } => {
                Self::not_found("AUTHOR_NOT_FOUND", "author not found")
            }
            UpdateAuthorError::Other(cause) => {
                Self::internal("AUTHOR_UPDATE_FAILED", "failed to update author", &cause)
            }
        }
    }
}

impl From<DeleteAuthorError> for ApiError {
    fn from(err: DeleteAuthorError) -> Self {
        match err {
            DeleteAuthorError::NotFound { .. } => {
                Self::not_found("AUTHOR_NOT_FOUND", "author not found")
            }
            DeleteAuthorError::HasBooks { .. } => Self::conflict(
                "AUTHOR_HAS_BOOKS",
                "author still owns books and cannot be deleted",
            ),
            DeleteAuthorError::Other(cause) => {
                Self::internal("AUTHOR_DELETE_FAILED", "failed to delete author", &cause)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAuthorHttpRequest {
    name: Option<String>,
    bio: Option<String>,
}

impl TryFrom<CreateAuthorHttpRequest> for CreateAuthorRequest {
    type Error = FieldErrors;

    fn try_from(value: CreateAuthorHttpRequest) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::default();
        let name = errors
            .require("name", value.name)
            .and_then(|raw| errors.check("name", "min", AuthorName::new(&raw)));
        let bio = errors.check(
            "bio",
            "max",
            Bio::new(value.bio.as_deref().unwrap_or_default()),
        );

        match (name, bio) {
            (Some(name), Some(bio)) => Ok(Self::new(name, bio)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAuthorHttpRequest {
    name: Option<String>,
    bio: Option<String>,
}

impl UpdateAuthorHttpRequest {
    fn into_domain(self, id: Uuid) -> Result<UpdateAuthorRequest, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut req = UpdateAuthorRequest::new(id);

        if let Some(raw) = self.name {
            if let Some(name) = errors.check("name", "min", AuthorName::new(&raw)) {
                req.set_name(name);
            }
        }
        if let Some(raw) = self.bio {
            if let Some(bio) = errors.check("bio", "max", Bio::new(&raw)) {
                req.set_bio(bio);
            }
        }

        if errors.is_empty() { Ok(req) } else { Err(errors) }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorSummaryHttpResponse {
    id: Uuid,
    name: String,
    bio: String,
}

impl From<&AuthorSummary> for AuthorSummaryHttpResponse {
    fn from(value: &AuthorSummary) -> Self {
        Self {
            id: value.id(),
            name: value.name().to_string(),
            bio: value.bio().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookSummaryHttpResponse {
    id: Uuid,
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Book> for BookSummaryHttpResponse {
    fn from(value: &Book) -> Self {
        Self {
            id: value.id(),
            title: value.title().to_string(),
            description: value.description().to_string(),
            published_at: value.published_at(),
            created_at: value.created_at(),
            updated_at: value.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorHttpResponse {
    id: Uuid,
    name: String,
    bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    books: Option<Vec<BookSummaryHttpResponse>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Author> for AuthorHttpResponse {
    fn from(value: &Author) -> Self {
        Self {
            id: value.id(),
            name: value.name().to_string(),
            bio: value.bio().to_string(),
            books: value
                .books()
                .map(|books| books.iter().map(BookSummaryHttpResponse::from).collect()),
            created_at: value.created_at(),
            updated_at: value.updated_at(),
        }
    }
}

pub async fn create_author<R: AuthorRepository>(
    State(state): State<AppState<R>>,
    body: Result<Json<CreateAuthorHttpRequest>, JsonRejection>,
) -> Result<ApiSuccess<AuthorHttpResponse>, ApiError> {
    let Json(body) = body?;
    let req = CreateAuthorRequest::try_from(body)?;
    state
        .repo
        .create_author(&req)
        .await
        .map_err(ApiError::from)
        .map(|author| ApiSuccess::new(StatusCode::CREATED, AuthorHttpResponse::from(&author)))
}

pub async fn list_authors<R: AuthorRepository>(
    State(state): State<AppState<R>>,
) -> Result<ApiSuccess<Vec<AuthorHttpResponse>>, ApiError> {
    let authors = state.repo.find_all_authors().await?;
    let authors = authors.iter().map(AuthorHttpResponse::from).collect();
    Ok(ApiSuccess::new(StatusCode::OK, authors))
}

pub async fn get_author<R: AuthorRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<ApiSuccess<AuthorHttpResponse>, ApiError> {
    let id = parse_path_id(&id, "INVALID_AUTHOR_ID", "invalid author id")?;
    state
        .repo
        .find_author(&FindAuthorRequest::new(id).with_books())
        .await
        .map_err(ApiError::from)
        .map(|author| ApiSuccess::new(StatusCode::OK, AuthorHttpResponse::from(&author)))
}

pub async fn update_author<R: AuthorRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateAuthorHttpRequest>, JsonRejection>,
) -> Result<ApiSuccess<AuthorHttpResponse>, ApiError> {
    let id = parse_path_id(&id, "INVALID_AUTHOR_ID", "invalid author id")?;
    let Json(body) = body?;
    let req = body.into_domain(id)?;
    if req.is_empty() {
        return Err(ApiError::bad_request(
            "NO_FIELDS_TO_UPDATE",
            "at least one field must be provided to update",
        ));
    }
    state
        .repo
        .update_author(&req)
        .await
        .map_err(ApiError::from)
        .map(|author| ApiSuccess::new(StatusCode::OK, AuthorHttpResponse::from(&author)))
}

pub async fn delete_author<R: AuthorRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&id, "INVALID_AUTHOR_ID", "invalid author id")?;
    state
        .repo
        .delete_author(&DeleteAuthorRequest::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
