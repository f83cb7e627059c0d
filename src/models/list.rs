use super::Book;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Ordering applied to a book listing. Ties are broken by insertion order, oldest
/// first for ascending keys and newest first for descending ones, so a `*_desc`
/// key lists the rows of its `*_asc` twin in reverse. Undated books are the one
/// exception: they stay last under both `published_at` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    TitleAsc,
    TitleDesc,
    PublishedAtDesc,
    PublishedAtAsc,
}

impl SortKey {
    pub const ALL: [Self; 6] = [
        Self::CreatedAtDesc,
        Self::CreatedAtAsc,
        Self::TitleAsc,
        Self::TitleDesc,
        Self::PublishedAtDesc,
        Self::PublishedAtAsc,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAtDesc => "created_at_desc",
            Self::CreatedAtAsc => "created_at_asc",
            Self::TitleAsc => "title_asc",
            Self::TitleDesc => "title_desc",
            Self::PublishedAtDesc => "published_at_desc",
            Self::PublishedAtAsc => "published_at_asc",
        }
    }

    pub const fn is_descending(self) -> bool {
        matches!(
            self,
            Self::CreatedAtDesc | Self::TitleDesc | Self::PublishedAtDesc
        )
    }

    /// Compares two books under this key. Books without a publication date sort last
    /// in both `published_at` directions.
    pub fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            Self::CreatedAtDesc => b.created_at().cmp(&a.created_at()),
            Self::CreatedAtAsc => a.created_at().cmp(&b.created_at()),
            Self::TitleAsc => a.title().as_str().cmp(b.title().as_str()),
            Self::TitleDesc => b.title().as_str().cmp(a.title().as_str()),
            Self::PublishedAtDesc => {
                nulls_last(a.published_at(), b.published_at(), |x, y| y.cmp(x))
            }
            Self::PublishedAtAsc => nulls_last(a.published_at(), b.published_at(), Ord::cmp),
        }
    }
}

fn nulls_last<F>(a: Option<NaiveDate>, b: Option<NaiveDate>, cmp: F) -> Ordering
where
    F: Fn(&NaiveDate, &NaiveDate) -> Ordering,
{
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("\"{0}\" is not a known sort key")]
pub struct UnknownSortKeyError(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownSortKeyError(s.into()))
    }
}

/// Reads a page number, substituting the default for anything missing,
/// non-numeric or non-positive. Pages past `u32::MAX` saturate, which still
/// lands beyond the last page.
pub fn page_or_default(raw: Option<&str>) -> u32 {
    let Some(digits) = raw
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
    else {
        return DEFAULT_PAGE;
    };
    match digits.parse::<u64>() {
        Ok(0) => DEFAULT_PAGE,
        Ok(page) => u32::try_from(page).unwrap_or(u32::MAX),
        // only overflow is left once every byte is a digit
        Err(_) => u32::MAX,
    }
}

/// Reads a page size. Missing, non-numeric or non-positive values fall back to the
/// default; oversized values are clamped to [`MAX_PAGE_SIZE`].
pub fn page_size_or_default(raw: Option<&str>) -> u32 {
    match raw.and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(size) => u32::try_from(size.min(u64::from(MAX_PAGE_SIZE))).unwrap_or(MAX_PAGE_SIZE),
    }
}

/// Folds text for the free-text filter. Both stores compare folded text, so
/// matching ignores case beyond ASCII.
pub fn fold_for_search(text: &str) -> String {
    text.to_lowercase()
}

/// Validated descriptor for a book listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookListParams {
    page: u32,
    page_size: u32,
    sort: SortKey,
    query: Option<String>,
    author_id: Option<Uuid>,
    published_after: Option<NaiveDate>,
    published_before: Option<NaiveDate>,
    with_author: bool,
}

impl Default for BookListParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortKey::default(),
            query: None,
            author_id: None,
            published_after: None,
            published_before: None,
            with_author: true,
        }
    }
}

impl BookListParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = if page == 0 { DEFAULT_PAGE } else { page };
        self
    }

    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else if page_size > MAX_PAGE_SIZE {
            MAX_PAGE_SIZE
        } else {
            page_size
        };
        self
    }

    #[must_use]
    pub const fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the free-text filter. Blank input clears it.
    #[must_use]
    pub fn query(mut self, query: &str) -> Self {
        let trimmed = query.trim();
        self.query = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    #[must_use]
    pub const fn author_id(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }

    #[must_use]
    pub const fn published_after(mut self, date: NaiveDate) -> Self {
        self.published_after = Some(date);
        self
    }

    #[must_use]
    pub const fn published_before(mut self, date: NaiveDate) -> Self {
        self.published_before = Some(date);
        self
    }

    /// Controls whether each row carries its resolved author.
    #[must_use]
    pub const fn with_author(mut self, with_author: bool) -> Self {
        self.with_author = with_author;
        self
    }

    pub const fn page_number(&self) -> u32 {
        self.page
    }

    pub const fn page_len(&self) -> u32 {
        self.page_size
    }

    pub const fn sort_key(&self) -> SortKey {
        self.sort
    }

    pub fn text_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub const fn author_filter(&self) -> Option<Uuid> {
        self.author_id
    }

    pub const fn published_after_bound(&self) -> Option<NaiveDate> {
        self.published_after
    }

    pub const fn published_before_bound(&self) -> Option<NaiveDate> {
        self.published_before
    }

    pub const fn includes_author(&self) -> bool {
        self.with_author
    }

    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    pub const fn limit(&self) -> u64 {
        self.page_size as u64
    }

    /// Evaluates the filter predicate against a single book.
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(query) = &self.query {
            let needle = fold_for_search(query);
            let in_title = fold_for_search(book.title().as_str()).contains(&needle);
            let in_description = fold_for_search(book.description().as_str()).contains(&needle);
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(author_id) = self.author_id {
            if book.author_id() != author_id {
                return false;
            }
        }

        if let Some(after) = self.published_after {
            if !book.published_at().is_some_and(|date| date >= after) {
                return false;
            }
        }

        if let Some(before) = self.published_before {
            if !book.published_at().is_some_and(|date| date <= before) {
                return false;
            }
        }

        true
    }
}

pub const fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}

/// One page of a listing plus the number of rows matching the filter overall.
#[derive(Debug, Clone)]
pub struct BookPage {
    books: Vec<Book>,
    total: u64,
    page: u32,
    page_size: u32,
}

impl BookPage {
    pub fn new(books: Vec<Book>, total: u64, params: &BookListParams) -> Self {
        Self {
            books,
            total,
            page: params.page_number(),
            page_size: params.page_len(),
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    pub const fn page(&self) -> u32 {
        self.page
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn total_pages(&self) -> u64 {
        total_pages(self.total, self.page_size)
    }
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct ListBooksError(#[from] pub anyhow::Error);
