//! Genre repository with lazy get-or-create resolution.

use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

use crate::error::Result;
use crate::models::Genre;
use crate::repositories::{Page, PageRequest};

/// Data access for genres.
#[async_trait]
pub trait GenreRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Genre>>;

    /// Oldest genre with an exact (case-sensitive) title match.
    async fn find_by_title(&self, title: &str) -> Result<Option<Genre>>;

    /// Return the existing genre with this exact title, or create one owned
    /// by `owner`.
    ///
    /// Titles are not unique in the schema; concurrent first-time writers of
    /// the same title may both insert, in which case resolution settles on
    /// the oldest row from then on. Callers must reject blank titles before
    /// resolving.
    async fn resolve_or_create(&self, title: &str, owner: Option<&str>) -> Result<Genre>;

    async fn list(&self, page_request: PageRequest) -> Result<Page<Genre>>;
}

/// SQLite implementation of [`GenreRepository`].
pub struct SqliteGenreRepository {
    pool: SqlitePool,
}

impl SqliteGenreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenreRepository for SqliteGenreRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Genre>> {
        let genre = query_as::<_, Genre>("SELECT * FROM genres WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Genre>> {
        let genre = query_as::<_, Genre>(
            "SELECT * FROM genres WHERE title = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(genre)
    }

    async fn resolve_or_create(&self, title: &str, owner: Option<&str>) -> Result<Genre> {
        if let Some(existing) = self.find_by_title(title).await? {
            return Ok(existing);
        }

        let genre = Genre::new(title, owner.map(str::to_string));
        sqlx::query("INSERT INTO genres (id, title, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&genre.id)
            .bind(&genre.title)
            .bind(&genre.user_id)
            .bind(genre.created_at)
            .execute(&self.pool)
            .await?;

        debug!(genre = %genre.id, title = %genre.title, "created genre");
        Ok(genre)
    }

    async fn list(&self, page_request: PageRequest) -> Result<Page<Genre>> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?;

        let genres =
            query_as::<_, Genre>("SELECT * FROM genres ORDER BY title LIMIT ? OFFSET ?")
                .bind(page_request.limit() as i64)
                .bind(page_request.offset() as i64)
                .fetch_all(&self.pool)
                .await?;

        Ok(Page::new(genres, total.0 as u64, page_request))
    }
}
