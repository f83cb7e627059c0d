mod author;
mod book;
mod list;

pub use author::{
    Author, AuthorName, AuthorNameEmptyError, AuthorSummary, Bio, CreateAuthorError,
    CreateAuthorRequest, DeleteAuthorError, DeleteAuthorRequest, FindAllAuthorsError,
    FindAuthorError, FindAuthorRequest, UpdateAuthorError, UpdateAuthorRequest,
};
pub use book::{
    Book, BookTitle, BookTitleEmptyError, CreateBookError, CreateBookRequest, DeleteBookError,
    DeleteBookRequest, Description, FindBookError, FindBookRequest, InvalidDateError,
    UpdateBookError, UpdateBookRequest, parse_flexible_date,
};
pub use list::{
    BookListParams, BookPage, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, ListBooksError, MAX_PAGE_SIZE,
    SortKey, UnknownSortKeyError, fold_for_search, page_or_default, page_size_or_default,
    total_pages,
};

use thiserror::Error;

/// Upper bound, in characters, for free-text fields such as a bio or a description.
pub const MAX_TEXT_LEN: usize = 2000;

#[derive(Error, Debug)]
#[error("Text must be at most {max} characters long, got {len}")]
pub struct TextTooLongError {
    pub len: usize,
    pub max: usize,
}

fn check_text_len(raw: &str) -> Result<(), TextTooLongError> {
    let len = raw.chars().count();
    if len > MAX_TEXT_LEN {
        Err(TextTooLongError {
            len,
            max: MAX_TEXT_LEN,
        })
    } else {
        Ok(())
    }
}
