//! Domain models for the catalog and engagement store.
//!
//! Rows map 1:1 onto the tables created by the migrations; ids are UUIDv4
//! strings and timestamps are unix epoch seconds. The `Role` and `Visibility`
//! enums carry stable integer wire values that round-trip identically through
//! the database and through serde.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account role. Wire values: listener = 1, artist = 2.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "i64", into = "i64")]
#[repr(i32)]
pub enum Role {
    Listener = 1,
    Artist = 2,
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role as i64
    }
}

impl TryFrom<i64> for Role {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Listener),
            2 => Ok(Role::Artist),
            other => Err(format!("unknown role value {other}")),
        }
    }
}

/// Song visibility. Wire values: public = 1, private = 2.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "i64", into = "i64")]
#[repr(i32)]
pub enum Visibility {
    Public = 1,
    Private = 2,
}

impl From<Visibility> for i64 {
    fn from(visibility: Visibility) -> Self {
        visibility as i64
    }
}

impl TryFrom<i64> for Visibility {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Visibility::Public),
            2 => Ok(Visibility::Private),
            other => Err(format!("unknown visibility value {other}")),
        }
    }
}

/// A registered account, either listener or artist.
///
/// The billing columns hold the linkage to the external payment processor;
/// they are `None` until the user subscribes for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub plan_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            role,
            billing_customer_id: None,
            billing_subscription_id: None,
            plan_id: None,
            subscription_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("email cannot be empty".to_string());
        }
        Ok(())
    }
}

/// A genre, created lazily the first time a song names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Genre {
    pub id: String,
    pub title: String,
    /// The user whose upload first created this genre, if any.
    pub user_id: Option<String>,
    pub created_at: i64,
}

impl Genre {
    pub fn new(title: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            user_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// An album. Like genres, albums referenced by title from a song upload are
/// created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub cover_image_url: Option<String>,
    pub user_id: Option<String>,
    pub created_at: i64,
}

impl Album {
    pub fn new(title: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            release_date: None,
            cover_image_url: None,
            user_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("album title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Maximum length of a song title.
pub const SONG_TITLE_MAX_LEN: usize = 100;

/// A song in the catalog.
///
/// `play_count` and `likes` are denormalized counters. `likes` always equals
/// the number of `song_likes` rows referencing the song; both counters are
/// mutated exclusively through atomic single-row updates in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub duration_secs: i64,
    pub release_date: NaiveDate,
    pub audio_url: String,
    pub play_count: i64,
    pub likes: i64,
    pub visibility: Visibility,
    pub licensing_info: Option<String>,
    pub user_id: Option<String>,
    pub album_id: Option<String>,
    pub genre_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Song {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("song title cannot be empty".to_string());
        }
        if self.title.chars().count() > SONG_TITLE_MAX_LEN {
            return Err(format!(
                "song title exceeds {SONG_TITLE_MAX_LEN} characters"
            ));
        }
        if self.duration_secs < 0 {
            return Err("duration cannot be negative".to_string());
        }
        if self.audio_url.trim().is_empty() {
            return Err("audio URL cannot be empty".to_string());
        }
        if self.play_count < 0 || self.likes < 0 {
            return Err("counters cannot be negative".to_string());
        }
        Ok(())
    }
}

/// One like per (user, song).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SongLike {
    pub id: String,
    pub user_id: String,
    pub song_id: String,
    pub created_at: i64,
}

/// One favorite per (user, song), ordered by recency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FavoriteSong {
    pub id: String,
    pub user_id: String,
    pub song_id: String,
    pub created_at: i64,
}

/// One favorite per (user, album).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FavoriteAlbum {
    pub id: String,
    pub user_id: String,
    pub album_id: String,
    pub created_at: i64,
}

/// One row per (user, song); replays refresh `played_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RecentlyPlayed {
    pub id: String,
    pub user_id: String,
    pub song_id: String,
    pub played_at: i64,
}

/// One follow per (follower, artist); self-follows are rejected by the
/// database CHECK constraint as well as by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ArtistFollow {
    pub id: String,
    pub follower_id: String,
    pub artist_id: String,
    pub created_at: i64,
}
