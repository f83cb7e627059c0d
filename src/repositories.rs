use crate::models::{
    Author, Book, BookListParams, BookPage, CreateAuthorError, CreateAuthorRequest,
    CreateBookError, CreateBookRequest, DeleteAuthorError, DeleteAuthorRequest, DeleteBookError,
    DeleteBookRequest, FindAllAuthorsError, FindAuthorError, FindAuthorRequest, FindBookError,
    FindBookRequest, ListBooksError, UpdateAuthorError, UpdateAuthorRequest, UpdateBookError,
    UpdateBookRequest,
};
use async_trait::async_trait;

#[async_trait]
pub trait AuthorRepository: Send + Sync + 'static {
    async fn create_author(&self, req: &CreateAuthorRequest) -> Result<Author, CreateAuthorError>;

    async fn find_author(&self, req: &FindAuthorRequest) -> Result<Author, FindAuthorError>;

    /// Lists every author, newest first. Books are never attached here.
    async fn find_all_authors(&self) -> Result<Vec<Author>, FindAllAuthorsError>;

    async fn update_author(&self, req: &UpdateAuthorRequest) -> Result<Author, UpdateAuthorError>;

    async fn delete_author(&self, req: &DeleteAuthorRequest) -> Result<(), DeleteAuthorError>;
}

#[async_trait]
pub trait BookRepository: Send + Sync + 'static {
    async fn create_book(&self, req: &CreateBookRequest) -> Result<Book, CreateBookError>;

    async fn find_book(&self, req: &FindBookRequest) -> Result<Book, FindBookError>;

    /// Returns the requested page and the number of books matching the filter
    /// before pagination.
    async fn list_books(&self, params: &BookListParams) -> Result<BookPage, ListBooksError>;

    async fn update_book(&self, req: &UpdateBookRequest) -> Result<Book, UpdateBookError>;

    async fn delete_book(&self, req: &DeleteBookRequest) -> Result<(), DeleteBookError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync + 'static {
    async fn ping(&self) -> anyhow::Result<()>;
}
