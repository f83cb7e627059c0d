use super::{AuthorSummary, TextTooLongError, check_text_len};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Layouts accepted for dates supplied in request bodies, tried in order.
const BODY_DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookTitle(String);

impl BookTitle {
    pub fn new(raw: &str) -> Result<Self, BookTitleEmptyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Err(BookTitleEmptyError)
        } else {
            Ok(Self(trimmed.into()))
        }
    }

    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
#[error("Book title cannot be empty")]
pub struct BookTitleEmptyError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description(String);

impl Description {
    pub fn new(raw: &str) -> Result<Self, TextTooLongError> {
        check_text_len(raw)?;
        Ok(Self(raw.into()))
    }

    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Description {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
#[error("Cannot parse date \"{0}\"")]
pub struct InvalidDateError(pub String);

/// Parses a date supplied in a request body. An empty string means "no date".
pub fn parse_flexible_date(raw: &str) -> Result<Option<NaiveDate>, InvalidDateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    for format in BODY_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(Some(date));
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| Some(dt.date_naive()))
        .map_err(|_| InvalidDateError(trimmed.into()))
}

/// A book record. `author` is only set when the lookup asked for it.
#[derive(Debug, Clone)]
pub struct Book {
    id: Uuid,
    title: BookTitle,
    author_id: Uuid,
    author: Option<AuthorSummary>,
    description: Description,
    published_at: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Book {
    pub const fn new(
        id: Uuid,
        title: BookTitle,
        author_id: Uuid,
        description: Description,
        published_at: Option<NaiveDate>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            author_id,
            author: None,
            description,
            published_at,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: AuthorSummary) -> Self {
        self.author = Some(author);
        self
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn title(&self) -> &BookTitle {
        &self.title
    }

    pub const fn author_id(&self) -> Uuid {
        self.author_id
    }

    pub const fn author(&self) -> Option<&AuthorSummary> {
        self.author.as_ref()
    }

    pub const fn description(&self) -> &Description {
        &self.description
    }

    pub const fn published_at(&self) -> Option<NaiveDate> {
        self.published_at
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug)]
pub struct CreateBookRequest {
    title: BookTitle,
    author_id: Uuid,
    description: Description,
    published_at: Option<NaiveDate>,
}

impl CreateBookRequest {
    pub const fn new(
        title: BookTitle,
        author_id: Uuid,
        description: Description,
        published_at: Option<NaiveDate>,
    ) -> Self {
        Self {
            title,
            author_id,
            description,
            published_at,
        }
    }

    pub const fn title(&self) -> &BookTitle {
        &self.title
    }

    pub const fn author_id(&self) -> Uuid {
        self.author_id
    }

    pub const fn description(&self) -> &Description {
        &self.description
    }

    pub const fn published_at(&self) -> Option<NaiveDate> {
        self.published_at
    }
}

#[derive(Error, Debug)]
pub enum CreateBookError {
    #[error("Author with id \"{author_id}\" does not exist")]
    AuthorNotFound { author_id: Uuid },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[derive(Debug)]
pub struct FindBookRequest {
    id: Uuid,
    with_author: bool,
}

impl FindBookRequest {
    pub const fn new(id: Uuid) -> Self {
        Self {
            id,
            with_author: false,
        }
    }

    /// Ask the repository to join the owning author into the lookup.
    #[must_use]
    pub const fn with_author(mut self) -> Self {
        self.with_author = true;
        self
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn includes_author(&self) -> bool {
        self.with_author
    }
}

#[derive(Error, Debug)]
pub enum FindBookError {
    #[error("Book with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[derive(Debug)]
pub struct UpdateBookRequest {
    id: Uuid,
    title: Option<BookTitle>,
    author_id: Option<Uuid>,
    description: Option<Description>,
    published_at: Option<Option<NaiveDate>>,
}

impl UpdateBookRequest {
    pub const fn new(id: Uuid) -> Self {
        Self {
            id,
            title: None,
            author_id: None,
            description: None,
            published_at: None,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn title(&self) -> Option<&BookTitle> {
        self.title.as_ref()
    }

    pub fn set_title(&mut self, title: BookTitle) {
        self.title = Some(title);
    }

    pub const fn author_id(&self) -> Option<Uuid> {
        self.author_id
    }

    pub fn set_author_id(&mut self, author_id: Uuid) {
        self.author_id = Some(author_id);
    }

    pub const fn description(&self) -> Option<&Description> {
        self.description.as_ref()
    }

    pub fn set_description(&mut self, description: Description) {
        self.description = Some(description);
    }

    /// `Some(None)` clears the publication date, `None` leaves it untouched.
    pub const fn published_at(&self) -> Option<Option<NaiveDate>> {
        self.published_at
    }

    pub fn set_published_at(&mut self, published_at: Option<NaiveDate>) {
        self.published_at = Some(published_at);
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author_id.is_none()
            && self.description.is_none()
            && self.published_at.is_none()
    }
}

#[derive(Error, Debug)]
pub enum UpdateBookError {
    #[error("Book with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error("Author with id \"{author_id}\" does not exist")]
    AuthorNotFound { author_id: Uuid },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[derive(Debug)]
pub struct DeleteBookRequest {
    id: Uuid,
}

impl DeleteBookRequest {
    pub const fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Error, Debug)]
pub enum DeleteBookError {
    #[error("Book with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn body_dates_accept_every_supported_layout() {
        let expected = Some(ymd(2006, 1, 2));
        assert_eq!(parse_flexible_date("2006-01-02").unwrap(), expected);
        assert_eq!(parse_flexible_date("02-01-2006").unwrap(), expected);
        assert_eq!(parse_flexible_date("2006/01/02").unwrap(), expected);
        assert_eq!(parse_flexible_date("January 2, 2006").unwrap(), expected);
        assert_eq!(parse_flexible_date("Jan 2, 2006").unwrap(), expected);
        assert_eq!(
            parse_flexible_date("2006-01-02T15:04:05Z").unwrap(),
            expected
        );
    }

    #[test]
    fn empty_body_date_means_no_date() {
        assert_eq!(parse_flexible_date("").unwrap(), None);
    }

    #[test]
    fn garbage_body_date_is_rejected() {
        assert!(parse_flexible_date("next tuesday").is_err());
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(BookTitle::new(" \t").is_err());
        assert_eq!(BookTitle::new(" Refactoring ").unwrap().as_str(), "Refactoring");
    }

    #[test]
    fn clearing_the_publication_date_counts_as_an_update() {
        let mut req = UpdateBookRequest::new(Uuid::nil());
        assert!(req.is_empty());
        req.set_published_at(None);
        assert!(!req.is_empty());
        assert_eq!(req.published_at(), Some(None));
    }
}
