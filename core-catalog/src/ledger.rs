//! The interaction ledger: likes, plays, favorites, follows.
//!
//! Every mutation here is a compound operation over an interaction row and,
//! for likes and plays, a denormalized counter on the song row. The rules:
//!
//! - counters move only through atomic single-row `SET x = x + 1` updates,
//!   never through values read into the application first;
//! - row existence checks, row writes, and counter updates for one logical
//!   action share one transaction;
//! - the `UNIQUE (user, target)` constraints turn duplicate writes into
//!   no-ops reported through [`AddOutcome`] / [`RemoveOutcome`], not errors.
//!
//! Together these keep `songs.likes` equal to the number of `song_likes`
//! rows under any interleaving of concurrent requests.

use chrono::Utc;
use sqlx::{query_as, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{Album, Role, Song, User};
use crate::policy::Caller;
use crate::repositories::{effective_limit, Page, PageRequest};

/// Result of an idempotent create (favorite, follow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Result of an idempotent delete (unfavorite, unfollow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// A recently played entry: the song plus when the user last played it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlayedSong {
    #[sqlx(flatten)]
    pub song: Song,
    pub played_at: i64,
}

/// Interaction ledger over the shared pool.
#[derive(Clone)]
pub struct InteractionLedger {
    pool: SqlitePool,
}

impl InteractionLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Like a song. Returns the song's current like count whether or not a
    /// new like was recorded; repeat calls never double-count.
    pub async fn like(&self, user_id: &str, song_id: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        ensure_song_exists(&mut tx, song_id).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO song_likes (id, user_id, song_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(song_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        let likes: (i64,) = if inserted.rows_affected() == 1 {
            query_as("UPDATE songs SET likes = likes + 1 WHERE id = ? RETURNING likes")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await?
        } else {
            query_as("SELECT likes FROM songs WHERE id = ?")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;
        debug!(user = %user_id, song = %song_id, likes = likes.0, "like");
        Ok(likes.0)
    }

    /// Remove a like. Returns the current like count; removing an absent
    /// like is a no-op.
    pub async fn unlike(&self, user_id: &str, song_id: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        ensure_song_exists(&mut tx, song_id).await?;

        let deleted = sqlx::query("DELETE FROM song_likes WHERE user_id = ? AND song_id = ?")
            .bind(user_id)
            .bind(song_id)
            .execute(&mut *tx)
            .await?;

        let likes: (i64,) = if deleted.rows_affected() == 1 {
            query_as("UPDATE songs SET likes = likes - 1 WHERE id = ? RETURNING likes")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await?
        } else {
            query_as("SELECT likes FROM songs WHERE id = ?")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;
        Ok(likes.0)
    }

    /// Record a play: every call counts. When the caller is authenticated,
    /// their recently-played entry for the song is upserted with a fresh
    /// timestamp. Returns the new play count.
    pub async fn record_play(&self, song_id: &str, caller: &Caller) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let play_count: Option<(i64,)> = query_as(
            "UPDATE songs SET play_count = play_count + 1 WHERE id = ? RETURNING play_count",
        )
        .bind(song_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((play_count,)) = play_count else {
            return Err(CatalogError::not_found("song", song_id));
        };

        if let Some(user_id) = caller.user_id() {
            sqlx::query(
                "INSERT INTO recently_played (id, user_id, song_id, played_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (user_id, song_id) DO UPDATE SET played_at = excluded.played_at",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(song_id)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(song = %song_id, play_count, "play");
        Ok(play_count)
    }

    pub async fn favorite_song(&self, user_id: &str, song_id: &str) -> Result<AddOutcome> {
        let mut tx = self.pool.begin().await?;
        ensure_song_exists(&mut tx, song_id).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO favorite_songs (id, user_id, song_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(song_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(add_outcome(inserted.rows_affected()))
    }

    pub async fn unfavorite_song(&self, user_id: &str, song_id: &str) -> Result<RemoveOutcome> {
        let deleted = sqlx::query("DELETE FROM favorite_songs WHERE user_id = ? AND song_id = ?")
            .bind(user_id)
            .bind(song_id)
            .execute(&self.pool)
            .await?;
        Ok(remove_outcome(deleted.rows_affected()))
    }

    pub async fn favorite_album(&self, user_id: &str, album_id: &str) -> Result<AddOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM albums WHERE id = ?")
            .bind(album_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CatalogError::not_found("album", album_id));
        }

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO favorite_albums (id, user_id, album_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(album_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(add_outcome(inserted.rows_affected()))
    }

    pub async fn unfavorite_album(&self, user_id: &str, album_id: &str) -> Result<RemoveOutcome> {
        let deleted =
            sqlx::query("DELETE FROM favorite_albums WHERE user_id = ? AND album_id = ?")
                .bind(user_id)
                .bind(album_id)
                .execute(&self.pool)
                .await?;
        Ok(remove_outcome(deleted.rows_affected()))
    }

    /// Follow an artist. The target must exist, hold the artist role, and
    /// differ from the follower.
    pub async fn follow(&self, follower_id: &str, artist_id: &str) -> Result<AddOutcome> {
        if follower_id == artist_id {
            return Err(CatalogError::validation(
                "artist",
                "users cannot follow themselves",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let target = query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(artist_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CatalogError::not_found("user", artist_id))?;
        match target.role {
            Role::Artist => {}
            Role::Listener => {
                return Err(CatalogError::validation(
                    "artist",
                    "only artist accounts can be followed",
                ));
            }
        }

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO artist_follows (id, follower_id, artist_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(follower_id)
        .bind(artist_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(follower = %follower_id, artist = %artist_id, "follow");
        Ok(add_outcome(inserted.rows_affected()))
    }

    pub async fn unfollow(&self, follower_id: &str, artist_id: &str) -> Result<RemoveOutcome> {
        let deleted =
            sqlx::query("DELETE FROM artist_follows WHERE follower_id = ? AND artist_id = ?")
                .bind(follower_id)
                .bind(artist_id)
                .execute(&self.pool)
                .await?;
        Ok(remove_outcome(deleted.rows_affected()))
    }

    /// A user's favorite songs, most recently favorited first.
    pub async fn favorite_songs(
        &self,
        user_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Song>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM favorite_songs WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let songs = query_as::<_, Song>(
            "SELECT songs.* FROM songs
             INNER JOIN favorite_songs ON favorite_songs.song_id = songs.id
             WHERE favorite_songs.user_id = ?
             ORDER BY favorite_songs.created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(songs, total.0 as u64, page_request))
    }

    /// A user's favorite albums, most recently favorited first.
    pub async fn favorite_albums(
        &self,
        user_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM favorite_albums WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let albums = query_as::<_, Album>(
            "SELECT albums.* FROM albums
             INNER JOIN favorite_albums ON favorite_albums.album_id = albums.id
             WHERE favorite_albums.user_id = ?
             ORDER BY favorite_albums.created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(albums, total.0 as u64, page_request))
    }

    /// A user's listening history, most recent first.
    pub async fn recently_played(&self, user_id: &str, limit: i64) -> Result<Vec<PlayedSong>> {
        let limit = effective_limit(limit)?;

        let entries = query_as::<_, PlayedSong>(
            "SELECT songs.*, recently_played.played_at FROM songs
             INNER JOIN recently_played ON recently_played.song_id = songs.id
             WHERE recently_played.user_id = ?
             ORDER BY recently_played.played_at DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Artists this user follows, most recently followed first.
    pub async fn following(&self, user_id: &str) -> Result<Vec<User>> {
        let users = query_as::<_, User>(
            "SELECT users.* FROM users
             INNER JOIN artist_follows ON artist_follows.artist_id = users.id
             WHERE artist_follows.follower_id = ?
             ORDER BY artist_follows.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Users following this artist, most recent first.
    pub async fn followers(&self, artist_id: &str) -> Result<Vec<User>> {
        let users = query_as::<_, User>(
            "SELECT users.* FROM users
             INNER JOIN artist_follows ON artist_follows.follower_id = users.id
             WHERE artist_follows.artist_id = ?
             ORDER BY artist_follows.created_at DESC",
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

async fn ensure_song_exists(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    song_id: &str,
) -> Result<()> {
    let exists = sqlx::query("SELECT 1 FROM songs WHERE id = ?")
        .bind(song_id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_none() {
        return Err(CatalogError::not_found("song", song_id));
    }
    Ok(())
}

fn add_outcome(rows_affected: u64) -> AddOutcome {
    if rows_affected == 1 {
        AddOutcome::Added
    } else {
        AddOutcome::AlreadyPresent
    }
}

fn remove_outcome(rows_affected: u64) -> RemoveOutcome {
    if rows_affected == 1 {
        RemoveOutcome::Removed
    } else {
        RemoveOutcome::NotPresent
    }
}
