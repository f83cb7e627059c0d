use super::{Sqlite, is_foreign_key_violation};
use crate::models::{
    Book, BookListParams, BookPage, CreateBookError, CreateBookRequest, DeleteBookError,
    DeleteBookRequest, FindBookError, FindBookRequest, ListBooksError, SortKey, UpdateBookError,
    UpdateBookRequest, fold_for_search,
};
use crate::repositories::BookRepository;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

const SELECT_WITH_AUTHOR: &str = "SELECT b.id, b.title, b.author_id, b.description, \
    b.published_at, b.created_at, b.updated_at, a.name AS author_name, a.bio AS author_bio \
    FROM books b JOIN authors a ON a.id = b.author_id";

const SELECT_WITHOUT_AUTHOR: &str = "SELECT b.id, b.title, b.author_id, b.description, \
    b.published_at, b.created_at, b.updated_at, NULL AS author_name, NULL AS author_bio \
    FROM books b";

const fn select_books(with_author: bool) -> &'static str {
    if with_author {
        SELECT_WITH_AUTHOR
    } else {
        SELECT_WITHOUT_AUTHOR
    }
}

/// ORDER BY clause for a sort key. `rowid` breaks ties by insertion order,
/// newest first for the descending keys.
const fn order_by(sort: SortKey) -> &'static str {
    match sort {
        SortKey::CreatedAtDesc => "b.created_at DESC, b.rowid DESC",
        SortKey::CreatedAtAsc => "b.created_at ASC, b.rowid ASC",
        SortKey::TitleAsc => "b.title ASC, b.rowid ASC",
        SortKey::TitleDesc => "b.title DESC, b.rowid DESC",
        SortKey::PublishedAtDesc => "b.published_at DESC NULLS LAST, b.rowid DESC",
        SortKey::PublishedAtAsc => "b.published_at ASC NULLS LAST, b.rowid ASC",
    }
}

/// Builds a LIKE pattern matching `raw` anywhere, with wildcards in `raw` escaped.
fn contains_pattern(raw: &str) -> String {
    let mut pattern = String::with_capacity(raw.len() + 2);
    pattern.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filters(query: &mut QueryBuilder<'_, sqlx::Sqlite>, params: &BookListParams) {
    query.push(" WHERE 1 = 1");

    if let Some(text) = params.text_query() {
        let pattern = contains_pattern(&fold_for_search(text));
        query
            .push(" AND (b.title_folded LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR b.description_folded LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(author_id) = params.author_filter() {
        query
            .push(" AND b.author_id = ")
            .push_bind(author_id.to_string());
    }
    if let Some(after) = params.published_after_bound() {
        query.push(" AND b.published_at >= ").push_bind(after);
    }
    if let Some(before) = params.published_before_bound() {
        query.push(" AND b.published_at <= ").push_bind(before);
    }
}

async fn fetch_book(
    pool: &SqlitePool,
    id: Uuid,
    with_author: bool,
) -> Result<Option<Book>, sqlx::Error> {
    let mut query = QueryBuilder::<sqlx::Sqlite>::new(select_books(with_author));
    query.push(" WHERE b.id = ").push_bind(id.to_string());
    query.build_query_as().fetch_optional(pool).await
}

/// Counts and fetches inside one read transaction so the total and the rows
/// come from the same snapshot.
async fn fetch_page(pool: &SqlitePool, params: &BookListParams) -> Result<BookPage, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut count = QueryBuilder::<sqlx::Sqlite>::new("SELECT COUNT(*) FROM books b");
    push_filters(&mut count, params);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

    let mut rows = QueryBuilder::<sqlx::Sqlite>::new(select_books(params.includes_author()));
    push_filters(&mut rows, params);
    rows.push(" ORDER BY ").push(order_by(params.sort_key()));
    rows.push(" LIMIT ")
        .push_bind(i64::try_from(params.limit()).unwrap_or(i64::MAX))
        .push(" OFFSET ")
        .push_bind(i64::try_from(params.offset()).unwrap_or(i64::MAX));
    let books: Vec<Book> = rows.build_query_as().fetch_all(&mut *tx).await?;

    tx.commit().await?;

    let total = u64::try_from(total).unwrap_or_default();
    Ok(BookPage::new(books, total, params))
}

#[async_trait]
impl BookRepository for Sqlite {
    async fn create_book(&self, req: &CreateBookRequest) -> Result<Book, CreateBookError> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let to_other = |err: sqlx::Error| {
            let err = anyhow!(err).context(format!(
                r#"Failed to create book with title "{}""#,
                req.title()
            ));
            CreateBookError::Other(err)
        };

        sqlx::query(
            "INSERT INTO books (id, title, author_id, description, published_at, title_folded, \
             description_folded, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(req.title().as_str())
        .bind(req.author_id().to_string())
        .bind(req.description().as_str())
        .bind(req.published_at())
        .bind(fold_for_search(req.title().as_str()))
        .bind(fold_for_search(req.description().as_str()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                CreateBookError::AuthorNotFound {
                    author_id: req.author_id(),
                }
            } else {
                to_other(err)
            }
        })?;

        tracing::debug!(book_id = %id, author_id = %req.author_id(), "book created");

        fetch_book(&self.pool, id, true)
            .await
            .map_err(to_other)?
            .ok_or_else(|| CreateBookError::Other(anyhow!("Created book {id} vanished")))
    }

    async fn find_book(&self, req: &FindBookRequest) -> Result<Book, FindBookError> {
        fetch_book(&self.pool, req.id(), req.includes_author())
            .await
            .map_err(|err| {
                let err = anyhow!(err).context(format!(
                    r#"Failed to retrieve book with id "{}""#,
                    req.id()
                ));
                FindBookError::Other(err)
            })?
            .ok_or(FindBookError::NotFound { id: req.id() })
    }

    async fn list_books(&self, params: &BookListParams) -> Result<BookPage, ListBooksError> {
        fetch_page(&self.pool, params).await.map_err(|err| {
            let err = anyhow!(err).context(format!(
                "Failed to list books (page {}, sort {})",
                params.page_number(),
                params.sort_key()
            ));
            ListBooksError(err)
        })
    }

    async fn update_book(&self, req: &UpdateBookRequest) -> Result<Book, UpdateBookError> {
        let mut query = QueryBuilder::<sqlx::Sqlite>::new("UPDATE books SET ");
        let mut assignments = query.separated(", ");
        if let Some(title) = req.title() {
            assignments.push("title = ");
            assignments.push_bind_unseparated(title.to_string());
            assignments.push("title_folded = ");
            assignments.push_bind_unseparated(fold_for_search(title.as_str()));
        }
        if let Some(author_id) = req.author_id() {
            assignments.push("author_id = ");
            assignments.push_bind_unseparated(author_id.to_string());
        }
        if let Some(description) = req.description() {
            assignments.push("description = ");
            assignments.push_bind_unseparated(description.to_string());
            assignments.push("description_folded = ");
            assignments.push_bind_unseparated(fold_for_search(description.as_str()));
        }
        if let Some(published_at) = req.published_at() {
            assignments.push("published_at = ");
            assignments.push_bind_unseparated(published_at);
        }
        assignments.push("updated_at = ");
        assignments.push_bind_unseparated(Utc::now());
        query.push(" WHERE id = ").push_bind(req.id().to_string());

        let to_other = |err: sqlx::Error| {
            let err = anyhow!(err)
                .context(format!(r#"Failed to update book with id "{}""#, req.id()));
            UpdateBookError::Other(err)
        };

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|err| match req.author_id() {
                Some(author_id) if is_foreign_key_violation(&err) => {
                    UpdateBookError::AuthorNotFound { author_id }
                }
                _ => to_other(err),
            })?;
        if result.rows_affected() == 0 {
            return Err(UpdateBookError::NotFound { id: req.id() });
        }

        fetch_book(&self.pool, req.id(), true)
            .await
            .map_err(to_other)?
            .ok_or(UpdateBookError::NotFound { id: req.id() })
    }

    async fn delete_book(&self, req: &DeleteBookRequest) -> Result<(), DeleteBookError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(req.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                anyhow!(err).context(format!(r#"Failed to delete book with id "{}""#, req.id()))
            })?;

        if result.rows_affected() == 0 {
            return Err(DeleteBookError::NotFound { id: req.id() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Author, AuthorName, Bio, BookTitle, CreateAuthorRequest, Description, total_pages,
    };
    use crate::repositories::AuthorRepository;
    use chrono::NaiveDate;

    struct Seeded {
        db: Sqlite,
        author_a: Author,
        author_b: Author,
    }

    async fn author(db: &Sqlite, name: &str) -> Author {
        let req = CreateAuthorRequest::new(AuthorName::new_unchecked(name), Bio::default());
        db.create_author(&req).await.unwrap()
    }

    async fn book(db: &Sqlite, title: &str, author: &Author, published: Option<NaiveDate>) -> Book {
        let req = CreateBookRequest::new(
            BookTitle::new_unchecked(title),
            author.id(),
            Description::default(),
            published,
        );
        db.create_book(&req).await.unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed() -> Seeded {
        let db = Sqlite::in_memory().await.unwrap();
        let author_a = author(&db, "Robert C. Martin").await;
        let author_b = author(&db, "Eric Evans").await;
        book(&db, "Clean Code", &author_a, Some(ymd(2008, 8, 1))).await;
        book(&db, "Clean Architecture", &author_a, Some(ymd(2017, 9, 10))).await;
        book(&db, "Domain-Driven Design", &author_b, Some(ymd(2003, 8, 30))).await;
        Seeded {
            db,
            author_a,
            author_b,
        }
    }

    fn titles(page: &BookPage) -> Vec<&str> {
        page.books().iter().map(|b| b.title().as_str()).collect()
    }

    #[tokio::test]
    async fn search_and_sort_by_title() {
        let seeded = seed().await;
        let params = BookListParams::new()
            .page_size(10)
            .sort(SortKey::TitleAsc)
            .query("Clean");

        let page = seeded.db.list_books(&params).await.unwrap();

        assert_eq!(page.total(), 2);
        assert_eq!(titles(&page), ["Clean Architecture", "Clean Code"]);
    }

    #[tokio::test]
    async fn search_ignores_case_and_escapes_wildcards() {
        let seeded = seed().await;

        let page = seeded
            .db
            .list_books(&BookListParams::new().query("clean"))
            .await
            .unwrap();
        assert_eq!(page.total(), 2);

        let page = seeded
            .db
            .list_books(&BookListParams::new().query("%"))
            .await
            .unwrap();
        assert_eq!(page.total(), 0);
    }

    #[tokio::test]
    async fn filter_by_author_counts_only_matches() {
        let seeded = seed().await;
        let params = BookListParams::new()
            .page(1)
            .page_size(1)
            .author_id(seeded.author_b.id());

        let page = seeded.db.list_books(&params).await.unwrap();

        assert_eq!(page.total(), 1);
        assert_eq!(page.books().len(), 1);
        assert_eq!(page.books()[0].author_id(), seeded.author_b.id());
        let author = page.books()[0].author().unwrap();
        assert_eq!(author.name().as_str(), "Eric Evans");
    }

    #[tokio::test]
    async fn title_desc_reverses_title_asc() {
        let seeded = seed().await;
        let asc = seeded
            .db
            .list_books(&BookListParams::new().sort(SortKey::TitleAsc))
            .await
            .unwrap();
        let desc = seeded
            .db
            .list_books(&BookListParams::new().sort(SortKey::TitleDesc))
            .await
            .unwrap();

        let mut reversed = titles(&asc);
        reversed.reverse();
        assert_eq!(titles(&desc), reversed);
    }

    #[tokio::test]
    async fn duplicate_titles_reverse_exactly() {
        let seeded = seed().await;
        for _ in 0..3 {
            book(&seeded.db, "Clean Code", &seeded.author_b, None).await;
        }

        let ids = |page: &BookPage| page.books().iter().map(Book::id).collect::<Vec<_>>();
        let asc = seeded
            .db
            .list_books(&BookListParams::new().sort(SortKey::TitleAsc))
            .await
            .unwrap();
        let desc = seeded
            .db
            .list_books(&BookListParams::new().sort(SortKey::TitleDesc))
            .await
            .unwrap();

        let mut reversed = ids(&asc);
        reversed.reverse();
        assert_eq!(ids(&desc), reversed);
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let seeded = seed().await;
        book(&seeded.db, "Élan Vital", &seeded.author_a, None).await;

        let page = seeded
            .db
            .list_books(&BookListParams::new().query("élan"))
            .await
            .unwrap();
        assert_eq!(titles(&page), ["Élan Vital"]);

        let page = seeded
            .db
            .list_books(&BookListParams::new().query("ÉLAN"))
            .await
            .unwrap();
        assert_eq!(page.total(), 1);
    }

    #[tokio::test]
    async fn renamed_book_is_found_by_its_new_title() {
        let seeded = seed().await;
        let created = book(&seeded.db, "Draft", &seeded.author_a, None).await;

        let mut req = UpdateBookRequest::new(created.id());
        req.set_title(BookTitle::new_unchecked("Über Alles"));
        seeded.db.update_book(&req).await.unwrap();

        let page = seeded
            .db
            .list_books(&BookListParams::new().query("über"))
            .await
            .unwrap();
        assert_eq!(titles(&page), ["Über Alles"]);
        let page = seeded
            .db
            .list_books(&BookListParams::new().query("draft"))
            .await
            .unwrap();
        assert_eq!(page.total(), 0);
    }

    #[tokio::test]
    async fn newest_books_come_first_by_default() {
        let seeded = seed().await;
        let page = seeded.db.list_books(&BookListParams::new()).await.unwrap();
        assert_eq!(
            titles(&page),
            ["Domain-Driven Design", "Clean Architecture", "Clean Code"]
        );
    }

    #[tokio::test]
    async fn publication_bounds_are_inclusive() {
        let seeded = seed().await;
        let params = BookListParams::new()
            .published_after(ymd(2008, 8, 1))
            .published_before(ymd(2017, 9, 10))
            .sort(SortKey::PublishedAtAsc);

        let page = seeded.db.list_books(&params).await.unwrap();

        assert_eq!(titles(&page), ["Clean Code", "Clean Architecture"]);
    }

    #[tokio::test]
    async fn undated_books_sort_last() {
        let seeded = seed().await;
        book(&seeded.db, "Working Draft", &seeded.author_a, None).await;

        for sort in [SortKey::PublishedAtAsc, SortKey::PublishedAtDesc] {
            let page = seeded
                .db
                .list_books(&BookListParams::new().sort(sort))
                .await
                .unwrap();
            assert_eq!(titles(&page).last(), Some(&"Working Draft"));
        }
    }

    #[tokio::test]
    async fn page_past_the_end_keeps_totals() {
        let seeded = seed().await;
        let params = BookListParams::new().page(5).page_size(2);

        let page = seeded.db.list_books(&params).await.unwrap();

        assert!(page.books().is_empty());
        assert_eq!(page.total(), 3);
        assert_eq!(page.total_pages(), 2);
    }

    #[tokio::test]
    async fn pages_never_exceed_page_size() {
        let seeded = seed().await;
        for page_size in 1..=4 {
            let params = BookListParams::new().page_size(page_size);
            let page = seeded.db.list_books(&params).await.unwrap();
            assert!(page.books().len() <= page_size as usize);
            assert_eq!(page.total_pages(), total_pages(3, page_size));
        }
    }

    #[tokio::test]
    async fn rows_can_skip_the_author_join() {
        let seeded = seed().await;
        let page = seeded
            .db
            .list_books(&BookListParams::new().with_author(false))
            .await
            .unwrap();
        assert!(page.books().iter().all(|b| b.author().is_none()));
    }

    #[tokio::test]
    async fn creating_a_book_for_a_missing_author_fails_distinctly() {
        let seeded = seed().await;
        let req = CreateBookRequest::new(
            BookTitle::new_unchecked("Orphan"),
            Uuid::now_v7(),
            Description::default(),
            None,
        );

        let err = seeded.db.create_book(&req).await.unwrap_err();
        assert!(matches!(err, CreateBookError::AuthorNotFound { .. }));
    }

    #[tokio::test]
    async fn update_can_clear_the_publication_date() {
        let seeded = seed().await;
        let created = book(&seeded.db, "Draft", &seeded.author_a, Some(ymd(2020, 1, 1))).await;

        let mut req = UpdateBookRequest::new(created.id());
        req.set_published_at(None);
        req.set_author_id(seeded.author_b.id());
        let updated = seeded.db.update_book(&req).await.unwrap();

        assert_eq!(updated.published_at(), None);
        assert_eq!(updated.author().unwrap().id(), seeded.author_b.id());
        assert_eq!(updated.title().as_str(), "Draft");
    }

    #[tokio::test]
    async fn update_to_a_missing_author_fails_distinctly() {
        let seeded = seed().await;
        let created = book(&seeded.db, "Draft", &seeded.author_a, None).await;

        let mut req = UpdateBookRequest::new(created.id());
        req.set_author_id(Uuid::now_v7());
        let err = seeded.db.update_book(&req).await.unwrap_err();

        assert!(matches!(err, UpdateBookError::AuthorNotFound { .. }));
    }

    #[tokio::test]
    async fn deleting_a_missing_book_is_not_found() {
        let seeded = seed().await;
        let err = seeded
            .db
            .delete_book(&DeleteBookRequest::new(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeleteBookError::NotFound { .. }));
    }

    #[tokio::test]
    async fn deleted_book_is_gone() {
        let seeded = seed().await;
        let created = book(&seeded.db, "Ephemeral", &seeded.author_a, None).await;

        seeded
            .db
            .delete_book(&DeleteBookRequest::new(created.id()))
            .await
            .unwrap();

        let err = seeded
            .db
            .find_book(&FindBookRequest::new(created.id()))
            .await
            .unwrap_err();
        assert!(matches!(err, FindBookError::NotFound { .. }));
    }
}
