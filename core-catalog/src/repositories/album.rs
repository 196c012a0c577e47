//! Album repository with the same lazy resolution semantics as genres.

use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::models::Album;
use crate::repositories::{Page, PageRequest};

/// Data access for albums.
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>>;

    /// Oldest album with an exact (case-sensitive) title match.
    async fn find_by_title(&self, title: &str) -> Result<Option<Album>>;

    /// Return the existing album with this exact title, or create a bare one
    /// owned by `owner`. Same non-unique-title caveat as genre resolution.
    async fn resolve_or_create(&self, title: &str, owner: Option<&str>) -> Result<Album>;

    /// Insert a fully specified album (explicit creation, as opposed to the
    /// lazy path above).
    async fn insert(&self, album: &Album) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list(&self, page_request: PageRequest) -> Result<Page<Album>>;
}

/// SQLite implementation of [`AlbumRepository`].
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(album)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>(
            "SELECT * FROM albums WHERE title = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(album)
    }

    async fn resolve_or_create(&self, title: &str, owner: Option<&str>) -> Result<Album> {
        if let Some(existing) = self.find_by_title(title).await? {
            return Ok(existing);
        }

        let album = Album::new(title, owner.map(str::to_string));
        self.insert(&album).await?;
        debug!(album = %album.id, title = %album.title, "created album");
        Ok(album)
    }

    async fn insert(&self, album: &Album) -> Result<()> {
        album
            .validate()
            .map_err(|message| CatalogError::validation("album", message))?;

        sqlx::query(
            "INSERT INTO albums (id, title, release_date, cover_image_url, user_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&album.id)
        .bind(&album.title)
        .bind(album.release_date)
        .bind(&album.cover_image_url)
        .bind(&album.user_id)
        .bind(album.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM albums WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, page_request: PageRequest) -> Result<Page<Album>> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM albums")
            .fetch_one(&self.pool)
            .await?;

        let albums =
            query_as::<_, Album>("SELECT * FROM albums ORDER BY title LIMIT ? OFFSET ?")
                .bind(page_request.limit() as i64)
                .bind(page_request.offset() as i64)
                .fetch_all(&self.pool)
                .await?;

        Ok(Page::new(albums, total.0 as u64, page_request))
    }
}
