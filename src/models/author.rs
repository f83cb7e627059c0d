use super::{Book, TextTooLongError, check_text_len};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorName(String);

impl AuthorName {
    pub fn new(raw: &str) -> Result<Self, AuthorNameEmptyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Err(AuthorNameEmptyError)
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

impl std::fmt::Display for AuthorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
#[error("Author name cannot be empty")]
pub struct AuthorNameEmptyError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bio(String);

impl Bio {
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

impl std::fmt::Display for Bio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An author record. `books` is only populated by detail lookups.
#[derive(Debug, Clone)]
pub struct Author {
    id: Uuid,
    name: AuthorName,
    bio: Bio,
    books: Option<Vec<Book>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Author {
    pub const fn new(
        id: Uuid,
        name: AuthorName,
        bio: Bio,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            bio,
            books: None,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn with_books(mut self, books: Vec<Book>) -> Self {
        self.books = Some(books);
        self
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn name(&self) -> &AuthorName {
        &self.name
    }

    pub const fn bio(&self) -> &Bio {
        &self.bio
    }

    pub fn books(&self) -> Option<&[Book]> {
        self.books.as_deref()
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary::new(self.id, self.name.clone(), self.bio.clone())
    }
}

/// The slice of an author embedded into every eagerly loaded book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSummary {
    id: Uuid,
    name: AuthorName,
    bio: Bio,
}

impl AuthorSummary {
    pub const fn new(id: Uuid, name: AuthorName, bio: Bio) -> Self {
        Self { id, name, bio }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn name(&self) -> &AuthorName {
        &self.name
    }

    pub const fn bio(&self) -> &Bio {
        &self.bio
    }
}

#[derive(Debug)]
pub struct CreateAuthorRequest {
    name: AuthorName,
    bio: Bio,
}

impl CreateAuthorRequest {
    pub const fn new(name: AuthorName, bio: Bio) -> Self {
        Self { name, bio }
    }

    pub const fn name(&self) -> &AuthorName {
        &self.name
    }

    pub const fn bio(&self) -> &Bio {
        &self.bio
    }
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct CreateAuthorError(#[from] pub anyhow::Error);

#[derive(Debug)]
pub struct FindAuthorRequest {
    id: Uuid,
    with_books: bool,
}

impl FindAuthorRequest {
    pub const fn new(id: Uuid) -> Self {
        Self {
            id,
            with_books: false,
        }
    }

    /// Ask the repository to resolve the author's books in the same lookup.
    #[must_use]
    pub const fn with_books(mut self) -> Self {
        self.with_books = true;
        self
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn includes_books(&self) -> bool {
        self.with_books
    }
}

#[derive(Error, Debug)]
pub enum FindAuthorError {
    #[error("Author with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct FindAllAuthorsError(#[from] pub anyhow::Error);

#[derive(Debug)]
pub struct UpdateAuthorRequest {
    id: Uuid,
    name: Option<AuthorName>,
    bio: Option<Bio>,
}

impl UpdateAuthorRequest {
    pub const fn new(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            bio: None,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn name(&self) -> Option<&AuthorName> {
        self.name.as_ref()
    }

    pub fn set_name(&mut self, name: AuthorName) {
        self.name = Some(name);
    }

    pub const fn bio(&self) -> Option<&Bio> {
        self.bio.as_ref()
    }

    pub fn set_bio(&mut self, bio: Bio) {
        self.bio = Some(bio);
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none()
    }
}

#[derive(Error, Debug)]
pub enum UpdateAuthorError {
    #[error("Author with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[derive(Debug)]
pub struct DeleteAuthorRequest {
    id: Uuid,
}

impl DeleteAuthorRequest {
    pub const fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Error, Debug)]
pub enum DeleteAuthorError {
    #[error("Author with id \"{id}\" does not exist")]
    NotFound { id: Uuid },
    #[error("Author with id \"{id}\" still owns books")]
    HasBooks { id: Uuid },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_name_is_trimmed() {
        let name = AuthorName::new("  Eric Evans ").unwrap();
        assert_eq!(name.as_str(), "Eric Evans");
    }

    #[test]
    fn blank_author_name_is_rejected() {
        assert!(AuthorName::new("   ").is_err());
    }

    #[test]
    fn bio_longer_than_limit_is_rejected() {
        let long = "x".repeat(super::super::MAX_TEXT_LEN + 1);
        let err = Bio::new(&long).unwrap_err();
        assert_eq!(err.len, super::super::MAX_TEXT_LEN + 1);
    }

    #[test]
    fn update_request_without_fields_is_empty() {
        let mut req = UpdateAuthorRequest::new(Uuid::nil());
        assert!(req.is_empty());
        req.set_bio(Bio::new_unchecked("bio"));
        assert!(!req.is_empty());
    }
}
