use crate::http::AppState;
use crate::http::authors::AuthorSummaryHttpResponse;
use crate::http::handler::{ApiError, ApiSuccess, FieldErrors, Pagination, parse_path_id};
use crate::models::{
    Book, BookListParams, BookPage, BookTitle, CreateBookError, CreateBookRequest,
    DeleteBookError, DeleteBookRequest, Description, FindBookError, FindBookRequest,
    ListBooksError, SortKey, UpdateBookError, UpdateBookRequest, page_or_default,
    page_size_or_default, parse_flexible_date,
};
use crate::repositories::BookRepository;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The only date layout accepted in query strings.
const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw listing parameters exactly as they arrive in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksHttpQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub q: Option<String>,
    pub author_id: Option<String>,
    pub published_after: Option<String>,
    pub published_before: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseListBooksQueryError {
    #[error(
        "sort must be one of created_at_desc, created_at_asc, title_asc, title_desc, \
         published_at_desc, published_at_asc"
    )]
    InvalidSortKey,
    #[error("author_id must be a valid UUID")]
    InvalidAuthorId,
    #[error("published_after must be in format YYYY-MM-DD")]
    InvalidPublishedAfter,
    #[error("published_before must be in format YYYY-MM-DD")]
    InvalidPublishedBefore,
}

impl ParseListBooksQueryError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSortKey => "INVALID_SORT_KEY",
            Self::InvalidAuthorId => "INVALID_AUTHOR_ID",
            Self::InvalidPublishedAfter => "INVALID_PUBLISHED_AFTER",
            Self::InvalidPublishedBefore => "INVALID_PUBLISHED_BEFORE",
        }
    }
}

/// Treats a missing or blank query value as absent.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_query_date(
    raw: Option<&str>,
    err: ParseListBooksQueryError,
) -> Result<Option<NaiveDate>, ParseListBooksQueryError> {
    present(raw)
        .map(|s| NaiveDate::parse_from_str(s, QUERY_DATE_FORMAT).map_err(|_| err))
        .transpose()
}

impl TryFrom<ListBooksHttpQuery> for BookListParams {
    type Error = ParseListBooksQueryError;

    fn try_from(value: ListBooksHttpQuery) -> Result<Self, Self::Error> {
        let mut params = Self::new()
            .page(page_or_default(value.page.as_deref()))
            .page_size(page_size_or_default(value.page_size.as_deref()))
            .query(value.q.as_deref().unwrap_or_default())
            .with_author(true);

        if let Some(sort) = present(value.sort.as_deref()) {
            let sort: SortKey = sort
                .parse()
                .map_err(|_| ParseListBooksQueryError::InvalidSortKey)?;
            params = params.sort(sort);
        }
        if let Some(author_id) = present(value.author_id.as_deref()) {
            let author_id = Uuid::parse_str(author_id)
                .map_err(|_| ParseListBooksQueryError::InvalidAuthorId)?;
            params = params.author_id(author_id);
        }
        if let Some(after) = parse_query_date(
            value.published_after.as_deref(),
            ParseListBooksQueryError::InvalidPublishedAfter,
        )? {
            params = params.published_after(after);
        }
        if let Some(before) = parse_query_date(
            value.published_before.as_deref(),
            ParseListBooksQueryError::InvalidPublishedBefore,
        )? {
            params = params.published_before(before);
        }

        Ok(params)
    }
}

impl From<ParseListBooksQueryError> for ApiError {
    fn from(err: ParseListBooksQueryError) -> Self {
        Self::bad_request(err.code(), err.to_string())
    }
}

impl From<ListBooksError> for ApiError {
    fn from(err: ListBooksError) -> Self {
        Self::internal("BOOK_LIST_FAILED", "failed to fetch books", &err.0)
    }
}

impl From<CreateBookError> for ApiError {
    fn from(err: CreateBookError) -> Self {
        match err {
            CreateBookError::AuthorNotFound { .. } => {
                Self::bad_request("AUTHOR_NOT_FOUND", "author does not exist")
            }
            CreateBookError::Other(cause) => {
                Self::internal("BOOK_CREATE_FAILED", "failed to create book", &cause)
            }
        }
    }
}

impl From<FindBookError> for ApiError {
    fn from(err: FindBookError) -> Self {
        match err {
            FindBookError::NotFound { .. } => Self::not_found("BOOK_NOT_FOUND", "book not found"),
            FindBookError::Other(cause) => {
                Self::internal("BOOK_FETCH_FAILED", "failed to fetch book", &cause)
            }
        }
    }
}

impl From<UpdateBookError> for ApiError {
    fn from(err: UpdateBookError) -> Self {
        match err {
            UpdateBookError::NotFound { .. } => {
                Self::not_found("BOOK_NOT_FOUND", "book not found")
            }
            UpdateBookError::AuthorNotFound { .. } => {
                Self::bad_request("AUTHOR_NOT_FOUND", "author does not exist")
            }
            UpdateBookError::Other(cause) => {
                Self::internal("BOOK_UPDATE_FAILED", "failed to update book", &cause)
            }
        }
    }
}

impl From<DeleteBookError> for ApiError {
    fn from(err: DeleteBookError) -> Self {
        match err {
            DeleteBookError::NotFound { .. } => {
                Self::not_found("BOOK_NOT_FOUND", "book not found")
            }
            DeleteBookError::Other(cause) => {
                Self::internal("BOOK_DELETE_FAILED", "failed to delete book", &cause)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookHttpRequest {
    title: Option<String>,
    author_id: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
}

impl TryFrom<CreateBookHttpRequest> for CreateBookRequest {
    type Error = FieldErrors;

    fn try_from(value: CreateBookHttpRequest) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::default();

        let title = errors
            .require("title", value.title)
            .and_then(|raw| errors.check("title", "min", BookTitle::new(&raw)));
        let author_id = errors
            .require("author_id", value.author_id)
            .and_then(|raw| errors.check("author_id", "uuid", Uuid::parse_str(&raw)));
        let description = errors.check(
            "description",
            "max",
            Description::new(value.description.as_deref().unwrap_or_default()),
        );
        let published_at = match value.published_at.as_deref() {
            Some(raw) => errors.check("published_at", "date", parse_flexible_date(raw)),
            None => Some(None),
        };

        match (title, author_id, description, published_at) {
            (Some(title), Some(author_id), Some(description), Some(published_at)) => {
                Ok(Self::new(title, author_id, description, published_at))
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookHttpRequest {
    title: Option<String>,
    author_id: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
}

impl UpdateBookHttpRequest {
    fn into_domain(self, id: Uuid) -> Result<UpdateBookRequest, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut req = UpdateBookRequest::new(id);

        if let Some(raw) = self.title {
            if let Some(title) = errors.check("title", "min", BookTitle::new(&raw)) {
                req.set_title(title);
            }
        }
        if let Some(raw) = self.author_id {
            if let Some(author_id) = errors.check("author_id", "uuid", Uuid::parse_str(&raw)) {
                req.set_author_id(author_id);
            }
        }
        if let Some(raw) = self.description {
            if let Some(description) = errors.check("description", "max", Description::new(&raw))
            {
                req.set_description(description);
            }
        }
        if let Some(raw) = self.published_at {
            if let Some(date) = errors.check("published_at", "date", parse_flexible_date(&raw)) {
                req.set_published_at(date);
            }
        }

        if errors.is_empty() { Ok(req) } else { Err(errors) }
    }
}

#[derive(Debug, Serialize)]
pub struct BookHttpResponse {
    id: Uuid,
    title: String,
    author_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<AuthorSummaryHttpResponse>,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Book> for BookHttpResponse {
    fn from(value: &Book) -> Self {
        Self {
            id: value.id(),
            title: value.title().to_string(),
            author_id: value.author_id(),
            author: value.author().map(AuthorSummaryHttpResponse::from),
            description: value.description().to_string(),
            published_at: value.published_at(),
            created_at: value.created_at(),
            updated_at: value.updated_at(),
        }
    }
}

impl From<&BookPage> for Pagination {
    fn from(value: &BookPage) -> Self {
        Self {
            page: value.page(),
            page_size: value.page_size(),
            total: value.total(),
            total_pages: value.total_pages(),
        }
    }
}

pub async fn list_books<R: BookRepository>(
    State(state): State<AppState<R>>,
    query: Result<Query<ListBooksHttpQuery>, QueryRejection>,
) -> Result<ApiSuccess<Vec<BookHttpResponse>>, ApiError> {
    let Query(query) = query?;
    let params = BookListParams::try_from(query)?;
    tracing::debug!(?params, "listing books");

    let page = state.repo.list_books(&params).await?;
    let pagination = Pagination::from(&page);
    let books = page.books().iter().map(BookHttpResponse::from).collect();
    Ok(ApiSuccess::paginated(StatusCode::OK, books, pagination))
}

pub async fn create_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    body: Result<Json<CreateBookHttpRequest>, JsonRejection>,
) -> Result<ApiSuccess<BookHttpResponse>, ApiError> {
    let Json(body) = body?;
    let req = CreateBookRequest::try_from(body)?;
    state
        .repo
        .create_book(&req)
        .await
        .map_err(ApiError::from)
        .map(|book| ApiSuccess::new(StatusCode::CREATED, BookHttpResponse::from(&book)))
}

pub async fn get_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<ApiSuccess<BookHttpResponse>, ApiError> {
    let id = parse_path_id(&id, "INVALID_BOOK_ID", "invalid book id")?;
    state
        .repo
        .find_book(&FindBookRequest::new(id).with_author())
        .await
        .map_err(ApiError::from)
        .map(|book| ApiSuccess::new(StatusCode::OK, BookHttpResponse::from(&book)))
}

pub async fn update_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateBookHttpRequest>, JsonRejection>,
) -> Result<ApiSuccess<BookHttpResponse>, ApiError> {
    let id = parse_path_id(&id, "INVALID_BOOK_ID", "invalid book id")?;
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
        .update_book(&req)
        .await
        .map_err(ApiError::from)
        .map(|book| ApiSuccess::new(StatusCode::OK, BookHttpResponse::from(&book)))
}

pub async fn delete_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&id, "INVALID_BOOK_ID", "invalid book id")?;
    state.repo.delete_book(&DeleteBookRequest::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListBooksHttpQuery {
        let mut query = ListBooksHttpQuery::default();
        for &(key, value) in pairs {
            let value = Some(value.to_string());
            match key {
                "page" => query.page = value,
                "page_size" => query.page_size = value,
                "sort" => query.sort = value,
                "q" => query.q = value,
                "author_id" => query.author_id = value,
                "published_after" => query.published_after = value,
                "published_before" => query.published_before = value,
                other => panic!("unexpected key {other}"),
            }
        }
        query
    }

    #[test]
    fn empty_query_yields_defaults() {
        let params = BookListParams::try_from(query(&[])).unwrap();
        assert_eq!(params, BookListParams::new());
        assert_eq!(params.sort_key(), SortKey::CreatedAtDesc);
        assert!(params.includes_author());
    }

    #[test]
    fn malformed_numbers_fall_back_and_large_sizes_clamp() {
        let params =
            BookListParams::try_from(query(&[("page", "zero"), ("page_size", "1000")])).unwrap();
        assert_eq!(params.page_number(), 1);
        assert_eq!(params.page_len(), 100);
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        let err = BookListParams::try_from(query(&[("sort", "popularity")])).unwrap_err();
        assert_eq!(err, ParseListBooksQueryError::InvalidSortKey);
        assert_eq!(err.code(), "INVALID_SORT_KEY");
    }

    #[test]
    fn malformed_author_id_is_rejected() {
        let err = BookListParams::try_from(query(&[("author_id", "42")])).unwrap_err();
        assert_eq!(err.code(), "INVALID_AUTHOR_ID");
    }

    #[test]
    fn each_malformed_date_bound_is_named() {
        let err =
            BookListParams::try_from(query(&[("published_after", "01/02/2020")])).unwrap_err();
        assert_eq!(err, ParseListBooksQueryError::InvalidPublishedAfter);

        let err =
            BookListParams::try_from(query(&[("published_before", "2020-13-01")])).unwrap_err();
        assert_eq!(err, ParseListBooksQueryError::InvalidPublishedBefore);
    }

    #[test]
    fn all_filters_are_carried_over() {
        let author_id = Uuid::now_v7();
        let raw = author_id.to_string();
        let params = BookListParams::try_from(query(&[
            ("page", "2"),
            ("page_size", "5"),
            ("sort", "title_desc"),
            ("q", " clean "),
            ("author_id", &raw),
            ("published_after", "2001-01-01"),
            ("published_before", "2010-12-31"),
        ]))
        .unwrap();

        assert_eq!(params.page_number(), 2);
        assert_eq!(params.page_len(), 5);
        assert_eq!(params.sort_key(), SortKey::TitleDesc);
        assert_eq!(params.text_query(), Some("clean"));
        assert_eq!(params.author_filter(), Some(author_id));
        assert_eq!(
            params.published_after_bound(),
            NaiveDate::from_ymd_opt(2001, 1, 1)
        );
        assert_eq!(
            params.published_before_bound(),
            NaiveDate::from_ymd_opt(2010, 12, 31)
        );
    }

    #[test]
    fn create_request_reports_every_bad_field() {
        let body = CreateBookHttpRequest {
            title: Some("  ".into()),
            author_id: None,
            description: None,
            published_at: Some("soon".into()),
        };
        let errors = CreateBookRequest::try_from(body).unwrap_err();
        let ApiError::Validation(fields) = ApiError::from(errors) else {
            panic!("expected a validation error");
        };
        assert_eq!(fields.len(), 3);
    }
}
