use super::{Sqlite, is_foreign_key_violation};
use crate::models::{
    Author, Book, CreateAuthorError, CreateAuthorRequest, DeleteAuthorError, DeleteAuthorRequest,
    FindAllAuthorsError, FindAuthorError, FindAuthorRequest, UpdateAuthorError,
    UpdateAuthorRequest,
};
use crate::repositories::AuthorRepository;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

async fn fetch_author(pool: &SqlitePool, id: Uuid) -> Result<Option<Author>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, bio, created_at, updated_at FROM authors WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
}

async fn fetch_author_detail(
    pool: &SqlitePool,
    req: &FindAuthorRequest,
) -> Result<Option<Author>, sqlx::Error> {
    let Some(author) = fetch_author(pool, req.id()).await? else {
        return Ok(None);
    };
    if !req.includes_books() {
        return Ok(Some(author));
    }

    let books: Vec<Book> = sqlx::query_as(
        "SELECT id, title, author_id, description, published_at, created_at, updated_at, \
         NULL AS author_name, NULL AS author_bio \
         FROM books WHERE author_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(req.id().to_string())
    .fetch_all(pool)
    .await?;

    Ok(Some(author.with_books(books)))
}

#[async_trait]
impl AuthorRepository for Sqlite {
    async fn create_author(&self, req: &CreateAuthorRequest) -> Result<Author, CreateAuthorError> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO authors (id, name, bio, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(req.name().as_str())
        .bind(req.bio().as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            let err = anyhow!(err).context(format!(
                r#"Failed to create author with name "{}""#,
                req.name()
            ));
            CreateAuthorError(err)
        })?;

        tracing::debug!(author_id = %id, "author created");
        Ok(Author::new(
            id,
            req.name().clone(),
            req.bio().clone(),
            now,
            now,
        ))
    }

    async fn find_author(&self, req: &FindAuthorRequest) -> Result<Author, FindAuthorError> {
        fetch_author_detail(&self.pool, req)
            .await
            .map_err(|err| {
                let err = anyhow!(err).context(format!(
                    r#"Failed to retrieve author with id "{}""#,
                    req.id()
                ));
                FindAuthorError::Other(err)
            })?
            .ok_or(FindAuthorError::NotFound { id: req.id() })
    }

    async fn find_all_authors(&self) -> Result<Vec<Author>, FindAllAuthorsError> {
        let authors = sqlx::query_as(
            "SELECT id, name, bio, created_at, updated_at FROM authors \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| {
            let err = anyhow!(err).context("Failed to retrieve all authors");
            FindAllAuthorsError(err)
        })?;

        Ok(authors)
    }

    async fn update_author(&self, req: &UpdateAuthorRequest) -> Result<Author, UpdateAuthorError> {
        let mut query = QueryBuilder::<sqlx::Sqlite>::new("UPDATE authors SET ");
        let mut assignments = query.separated(", ");
        if let Some(name) = req.name() {
            assignments.push("name = ");
            assignments.push_bind_unseparated(name.to_string());
        }
        if let Some(bio) = req.bio() {
            assignments.push("bio = ");
            assignments.push_bind_unseparated(bio.to_string());
        }
        assignments.push("updated_at = ");
        assignments.push_bind_unseparated(Utc::now());
        query.push(" WHERE id = ").push_bind(req.id().to_string());

        let to_other = |err: sqlx::Error| {
            let err = anyhow!(err).context(format!(
                r#"Failed to update author with id "{}""#,
                req.id()
            ));
            UpdateAuthorError::Other(err)
        };

        let result = query.build().execute(&self.pool).await.map_err(to_other)?;
        if result.rows_affected() == 0 {
            return Err(UpdateAuthorError::NotFound { id: req.id() });
        }

        fetch_author(&self.pool, req.id())
            .await
            .map_err(to_other)?
            .ok_or(UpdateAuthorError::NotFound { id: req.id() })
    }

    async fn delete_author(&self, req: &DeleteAuthorRequest) -> Result<(), DeleteAuthorError> {
        let result = sqlx::query("DELETE FROM authors WHERE id = ?")
            .bind(req.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    DeleteAuthorError::HasBooks { id: req.id() }
                } else {
                    let err = anyhow!(err)
                        .context(format!(r#"Failed to delete author with id "{}""#, req.id()));
                    DeleteAuthorError::Other(err)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DeleteAuthorError::NotFound { id: req.id() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorName, Bio, BookTitle, CreateBookRequest, Description};
    use crate::repositories::BookRepository;

    async fn create(db: &Sqlite, name: &str) -> Author {
        let req = CreateAuthorRequest::new(AuthorName::new_unchecked(name), Bio::default());
        db.create_author(&req).await.unwrap()
    }

    #[tokio::test]
    async fn created_author_can_be_found() {
        let db = Sqlite::in_memory().await.unwrap();
        let created = create(&db, "Robert C. Martin").await;

        let found = db
            .find_author(&FindAuthorRequest::new(created.id()))
            .await
            .unwrap();
        assert_eq!(found.name().as_str(), "Robert C. Martin");
        assert!(found.books().is_none());
    }

    #[tokio::test]
    async fn detail_lookup_attaches_books() {
        let db = Sqlite::in_memory().await.unwrap();
        let author = create(&db, "Eric Evans").await;
        let req = CreateBookRequest::new(
            BookTitle::new_unchecked("Domain-Driven Design"),
            author.id(),
            Description::default(),
            None,
        );
        db.create_book(&req).await.unwrap();

        let found = db
            .find_author(&FindAuthorRequest::new(author.id()).with_books())
            .await
            .unwrap();
        let books = found.books().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title().as_str(), "Domain-Driven Design");
    }

    #[tokio::test]
    async fn missing_author_is_not_found() {
        let db = Sqlite::in_memory().await.unwrap();
        let err = db
            .find_author(&FindAuthorRequest::new(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, FindAuthorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let db = Sqlite::in_memory().await.unwrap();
        let author = create(&db, "Martin Fowler").await;

        let mut req = UpdateAuthorRequest::new(author.id());
        req.set_bio(Bio::new_unchecked("Refactoring"));
        let updated = db.update_author(&req).await.unwrap();

        assert_eq!(updated.name().as_str(), "Martin Fowler");
        assert_eq!(updated.bio().as_str(), "Refactoring");
        assert!(updated.updated_at() >= author.updated_at());
    }

    #[tokio::test]
    async fn deleting_an_author_with_books_is_refused() {
        let db = Sqlite::in_memory().await.unwrap();
        let author = create(&db, "Kent Beck").await;
        let req = CreateBookRequest::new(
            BookTitle::new_unchecked("Test-Driven Development"),
            author.id(),
            Description::default(),
            None,
        );
        db.create_book(&req).await.unwrap();

        let err = db
            .delete_author(&DeleteAuthorRequest::new(author.id()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeleteAuthorError::HasBooks { .. }));
    }

    #[tokio::test]
    async fn deleting_a_missing_author_is_not_found() {
        let db = Sqlite::in_memory().await.unwrap();
        let err = db
            .delete_author(&DeleteAuthorRequest::new(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeleteAuthorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn authors_are_listed_newest_first() {
        let db = Sqlite::in_memory().await.unwrap();
        create(&db, "First").await;
        create(&db, "Second").await;

        let authors = db.find_all_authors().await.unwrap();
        let names: Vec<_> = authors.iter().map(|a| a.name().as_str()).collect();
        assert_eq!(names, ["Second", "First"]);
    }
}
