use crate::models::{
    Author, Book, BookListParams, BookPage, CreateAuthorError, CreateAuthorRequest,
    CreateBookError, CreateBookRequest, DeleteAuthorError, DeleteAuthorRequest, DeleteBookError,
    DeleteBookRequest, FindAllAuthorsError, FindAuthorError, FindAuthorRequest, FindBookError,
    FindBookRequest, ListBooksError, UpdateAuthorError, UpdateAuthorRequest, UpdateBookError,
    UpdateBookRequest,
};
use crate::repositories::{AuthorRepository, BookRepository, HealthCheck};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    authors: Vec<Author>,
    books: Vec<Book>,
}

impl Tables {
    fn author(&self, id: Uuid) -> Option<&Author> {
        self.authors.iter().find(|author| author.id() == id)
    }

    fn resolve(&self, book: &Book, with_author: bool) -> Book {
        match self.author(book.author_id()) {
            Some(author) if with_author => book.clone().with_author(author.summary()),
            _ => book.clone(),
        }
    }
}

/// Repository keeping every record in process memory. Vectors preserve insertion
/// order, which the stable sort relies on to break ties.
#[derive(Debug, Default)]
pub struct InMemory {
    tables: RwLock<Tables>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HealthCheck for InMemory {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl AuthorRepository for InMemory {
    async fn create_author(&self, req: &CreateAuthorRequest) -> Result<Author, CreateAuthorError> {
        let now = Utc::now();
        let author = Author::new(
            Uuid::now_v7(),
            req.name().clone(),
            req.bio().clone(),
            now,
            now,
        );
        self.tables.write().await.authors.push(author.clone());
        Ok(author)
    }

    async fn find_author(&self, req: &FindAuthorRequest) -> Result<Author, FindAuthorError> {
        let tables = self.tables.read().await;
        let author = tables
            .author(req.id())
            .cloned()
            .ok_or(FindAuthorError::NotFound { id: req.id() })?;

        if !req.includes_books() {
            return Ok(author);
        }
        let mut books: Vec<Book> = tables
            .books
            .iter()
            .rev()
            .filter(|book| book.author_id() == req.id())
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(author.with_books(books))
    }

    async fn find_all_authors(&self) -> Result<Vec<Author>, FindAllAuthorsError> {
        let tables = self.tables.read().await;
        let mut authors: Vec<Author> = tables.authors.iter().rev().cloned().collect();
        authors.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(authors)
    }

    async fn update_author(&self, req: &UpdateAuthorRequest) -> Result<Author, UpdateAuthorError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .authors
            .iter_mut()
            .find(|author| author.id() == req.id())
            .ok_or(UpdateAuthorError::NotFound { id: req.id() })?;

        let updated = Author::new(
            slot.id(),
            req.name().unwrap_or(slot.name()).clone(),
            req.bio().unwrap_or(slot.bio()).clone(),
            slot.created_at(),
            Utc::now(),
        );
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete_author(&self, req: &DeleteAuthorRequest) -> Result<(), DeleteAuthorError> {
        let mut tables = self.tables.write().await;
        let position = tables
            .authors
            .iter()
            .position(|author| author.id() == req.id())
            .ok_or(DeleteAuthorError::NotFound { id: req.id() })?;
        if tables.books.iter().any(|book| book.author_id() == req.id()) {
            return Err(DeleteAuthorError::HasBooks { id: req.id() });
        }
        tables.authors.remove(position);
        Ok(())
    }
}

#[async_trait]
impl BookRepository for InMemory {
    async fn create_book(&self, req: &CreateBookRequest) -> Result<Book, CreateBookError> {
        let mut tables = self.tables.write().await;
        let Some(author) = tables.author(req.author_id()) else {
            return Err(CreateBookError::AuthorNotFound {
                author_id: req.author_id(),
            });
        };
        let summary = author.summary();

        let now = Utc::now();
        let book = Book::new(
            Uuid::now_v7(),
            req.title().clone(),
            req.author_id(),
            req.description().clone(),
            req.published_at(),
            now,
            now,
        );
        tables.books.push(book.clone());
        Ok(book.with_author(summary))
    }

    async fn find_book(&self, req: &FindBookRequest) -> Result<Book, FindBookError> {
        let tables = self.tables.read().await;
        tables
            .books
            .iter()
            .find(|book| book.id() == req.id())
            .map(|book| tables.resolve(book, req.includes_author()))
            .ok_or(FindBookError::NotFound { id: req.id() })
    }

    async fn list_books(&self, params: &BookListParams) -> Result<BookPage, ListBooksError> {
        let tables = self.tables.read().await;

        let sort = params.sort_key();
        let mut matching: Vec<(usize, &Book)> = tables
            .books
            .iter()
            .enumerate()
            .filter(|(_, book)| params.matches(book))
            .collect();
        matching.sort_by(|(i, a), (j, b)| {
            let ties = if sort.is_descending() { j.cmp(i) } else { i.cmp(j) };
            sort.compare(a, b).then(ties)
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(params.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(params.limit()).unwrap_or(usize::MAX);
        let books = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, book)| tables.resolve(book, params.includes_author()))
            .collect();

        Ok(BookPage::new(books, total, params))
    }

    async fn update_book(&self, req: &UpdateBookRequest) -> Result<Book, UpdateBookError> {
        let mut tables = self.tables.write().await;
        if let Some(author_id) = req.author_id() {
            if tables.author(author_id).is_none() {
                return Err(UpdateBookError::AuthorNotFound { author_id });
            }
        }

        let slot = tables
            .books
            .iter_mut()
            .find(|book| book.id() == req.id())
            .ok_or(UpdateBookError::NotFound { id: req.id() })?;
        let updated = Book::new(
            slot.id(),
            req.title().unwrap_or(slot.title()).clone(),
            req.author_id().unwrap_or(slot.author_id()),
            req.description().unwrap_or(slot.description()).clone(),
            req.published_at().unwrap_or(slot.published_at()),
            slot.created_at(),
            Utc::now(),
        );
        *slot = updated.clone();

        Ok(tables.resolve(&updated, true))
    }

    async fn delete_book(&self, req: &DeleteBookRequest) -> Result<(), DeleteBookError> {
        let mut tables = self.tables.write().await;
        let position = tables
            .books
            .iter()
            .position(|book| book.id() == req.id())
            .ok_or(DeleteBookError::NotFound { id: req.id() })?;
        tables.books.remove(position);
        Ok(())
    }
}
