//! Song repository: row-level CRUD.
//!
//! Visibility filtering and feed ordering live in the query engine; counter
//! mutation lives in the ledger. This repository never touches `play_count`
//! or `likes` beyond their initial zero values.

use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

use crate::error::{CatalogError, Result};
use crate::models::Song;

/// Data access for songs.
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Song>>;

    async fn insert(&self, song: &Song) -> Result<()>;

    /// Full-row update of mutable fields. Counters are intentionally not
    /// written here.
    async fn update(&self, song: &Song) -> Result<()>;

    /// Delete a song; likes, favorites, and recently-played rows cascade.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of [`SongRepository`].
pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Song>> {
        let song = query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(song)
    }

    async fn insert(&self, song: &Song) -> Result<()> {
        song.validate()
            .map_err(|message| CatalogError::validation("song", message))?;

        sqlx::query(
            "INSERT INTO songs (
                id, title, duration_secs, release_date, audio_url,
                play_count, likes, visibility, licensing_info,
                user_id, album_id, genre_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&song.id)
        .bind(&song.title)
        .bind(song.duration_secs)
        .bind(song.release_date)
        .bind(&song.audio_url)
        .bind(song.play_count)
        .bind(song.likes)
        .bind(song.visibility)
        .bind(&song.licensing_info)
        .bind(&song.user_id)
        .bind(&song.album_id)
        .bind(&song.genre_id)
        .bind(song.created_at)
        .bind(song.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, song: &Song) -> Result<()> {
        song.validate()
            .map_err(|message| CatalogError::validation("song", message))?;

        let result = sqlx::query(
            "UPDATE songs SET
                title = ?, duration_secs = ?, release_date = ?, audio_url = ?,
                visibility = ?, licensing_info = ?, album_id = ?, genre_id = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&song.title)
        .bind(song.duration_secs)
        .bind(song.release_date)
        .bind(&song.audio_url)
        .bind(song.visibility)
        .bind(&song.licensing_info)
        .bind(&song.album_id)
        .bind(&song.genre_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(&song.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("song", song.id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{seed_user, song_fixture};
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::Visibility;

    #[tokio::test]
    async fn insert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let owner = seed_user(&pool, "ana", 2).await;
        let repo = SqliteSongRepository::new(pool);

        let song = song_fixture("first-light", &owner);
        repo.insert(&song).await.unwrap();

        let stored = repo.find_by_id(&song.id).await.unwrap().unwrap();
        assert_eq!(stored, song);
        assert_eq!(stored.play_count, 0);
        assert_eq!(stored.likes, 0);
    }

    #[tokio::test]
    async fn update_changes_fields_but_not_counters() {
        let pool = create_test_pool().await.unwrap();
        let owner = seed_user(&pool, "ana", 2).await;
        let repo = SqliteSongRepository::new(pool.clone());

        let mut song = song_fixture("draft", &owner);
        repo.insert(&song).await.unwrap();

        // Simulate ledger activity, then update the row.
        sqlx::query("UPDATE songs SET play_count = 7, likes = 3 WHERE id = ?")
            .bind(&song.id)
            .execute(&pool)
            .await
            .unwrap();

        song.title = "Final Cut".to_string();
        song.visibility = Visibility::Private;
        repo.update(&song).await.unwrap();

        let stored = repo.find_by_id(&song.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Final Cut");
        assert_eq!(stored.visibility, Visibility::Private);
        assert_eq!(stored.play_count, 7);
        assert_eq!(stored.likes, 3);
    }

    #[tokio::test]
    async fn update_missing_song_is_not_found() {
        let pool = create_test_pool().await.unwrap();
        let owner = seed_user(&pool, "ana", 2).await;
        let repo = SqliteSongRepository::new(pool);

        let song = song_fixture("phantom", &owner);
        assert!(matches!(
            repo.update(&song).await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_interaction_rows() {
        let pool = create_test_pool().await.unwrap();
        let owner = seed_user(&pool, "ana", 2).await;
        let listener = seed_user(&pool, "bob", 1).await;
        let repo = SqliteSongRepository::new(pool.clone());

        let song = song_fixture("short-lived", &owner);
        repo.insert(&song).await.unwrap();

        sqlx::query(
            "INSERT INTO song_likes (id, user_id, song_id, created_at) VALUES ('l1', ?, ?, 0)",
        )
        .bind(&listener)
        .bind(&song.id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO recently_played (id, user_id, song_id, played_at) VALUES ('r1', ?, ?, 0)",
        )
        .bind(&listener)
        .bind(&song.id)
        .execute(&pool)
        .await
        .unwrap();

        assert!(repo.delete(&song.id).await.unwrap());

        let likes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM song_likes")
            .fetch_one(&pool)
            .await
            .unwrap();
        let plays: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recently_played")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(likes.0, 0);
        assert_eq!(plays.0, 0);
    }

    #[tokio::test]
    async fn rejects_invalid_rows() {
        let pool = create_test_pool().await.unwrap();
        let owner = seed_user(&pool, "ana", 2).await;
        let repo = SqliteSongRepository::new(pool);

        let mut song = song_fixture("bad", &owner);
        song.audio_url = String::new();
        assert!(matches!(
            repo.insert(&song).await,
            Err(CatalogError::Validation { .. })
        ));
    }
}
