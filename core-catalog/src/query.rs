//! Feed and search queries over the catalog.
//!
//! Every read here goes through the visibility scope derived from the
//! caller, composed into the SQL itself so that filtering, ordering, and
//! truncation all happen in the database. Dynamic predicates are collected
//! as SQL fragments plus a bind list, in the same spirit as the repository
//! queries.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::{CatalogError, Result};
use crate::models::{Album, Genre, Song, Visibility};
use crate::policy::{self, Caller, VisibilityScope};
use crate::repositories::{effective_limit, Page, PageRequest};

const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;
const SECONDS_PER_MONTH: i64 = 30 * 24 * 60 * 60;

/// Default number of results per category in search.
pub const SEARCH_CATEGORY_LIMIT: i64 = 20;

/// Time window for the trending feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    All,
    Week,
    Month,
}

impl TimeRange {
    fn window_secs(self) -> Option<i64> {
        match self {
            TimeRange::All => None,
            TimeRange::Week => Some(SECONDS_PER_WEEK),
            TimeRange::Month => Some(SECONDS_PER_MONTH),
        }
    }
}

/// Which categories a search should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchScope {
    #[default]
    All,
    Songs,
    Albums,
    Artists,
}

/// A user as shown in artist listings and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ArtistSummary {
    pub id: String,
    pub username: String,
}

/// Aggregated search results, one list per requested category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub songs: Vec<Song>,
    pub albums: Vec<Album>,
    pub artists: Vec<ArtistSummary>,
}

/// Optional predicates for [`CatalogQueryService::list_songs`], ANDed
/// together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongFilter {
    /// Substring match on the genre title.
    pub genre: Option<String>,
    /// Substring match on the owner's username.
    pub artist: Option<String>,
    /// Substring match on the album title.
    pub album_title: Option<String>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
}

/// A song with its relations resolved for detail views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDetails {
    pub song: Song,
    pub genre: Option<Genre>,
    pub album: Option<Album>,
    pub artist: Option<ArtistSummary>,
}

#[derive(Debug, Clone)]
enum Bind {
    Text(String),
    Int(i64),
    Date(NaiveDate),
    Vis(Visibility),
}

/// Apply a collected bind list to a query in order.
macro_rules! bind_all {
    ($query:expr, $binds:expr) => {{
        let mut query = $query;
        for bind in $binds.iter() {
            query = match bind {
                Bind::Text(value) => query.bind(value.as_str()),
                Bind::Int(value) => query.bind(*value),
                Bind::Date(value) => query.bind(*value),
                Bind::Vis(value) => query.bind(*value),
            };
        }
        query
    }};
}

/// Push the caller's visibility scope as a WHERE fragment.
fn push_visibility(clauses: &mut Vec<String>, binds: &mut Vec<Bind>, caller: &Caller) {
    match policy::visibility_scope(caller) {
        VisibilityScope::PublicOnly => {
            clauses.push("songs.visibility = ?".to_string());
            binds.push(Bind::Vis(Visibility::Public));
        }
        VisibilityScope::PublicOrOwnedBy(owner) => {
            clauses.push("(songs.visibility = ? OR songs.user_id = ?)".to_string());
            binds.push(Bind::Vis(Visibility::Public));
            binds.push(Bind::Text(owner));
        }
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim().to_lowercase())
}

/// Read-side service over the catalog and ledger tables.
#[derive(Clone)]
pub struct CatalogQueryService {
    pool: SqlitePool,
}

impl CatalogQueryService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most played songs visible to the caller, optionally restricted to a
    /// recent window, ordered by play count and then like count.
    pub async fn trending(
        &self,
        caller: &Caller,
        range: TimeRange,
        limit: i64,
    ) -> Result<Vec<Song>> {
        let limit = effective_limit(limit)?;

        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);

        if let Some(window) = range.window_secs() {
            clauses.push("songs.created_at >= ?".to_string());
            binds.push(Bind::Int(Utc::now().timestamp() - window));
        }

        let sql = format!(
            "SELECT songs.* FROM songs WHERE {} \
             ORDER BY songs.play_count DESC, songs.likes DESC LIMIT ?",
            clauses.join(" AND ")
        );
        binds.push(Bind::Int(limit));

        let songs = bind_all!(sqlx::query_as::<_, Song>(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;
        Ok(songs)
    }

    /// Case-insensitive substring search across songs, albums, and artists.
    ///
    /// Songs match on their title, genre title, album title, or owner
    /// username; albums on title or owner username; artists on username
    /// (artist-role accounts only). Each requested category returns at most
    /// `limit` results (default 20).
    pub async fn search(
        &self,
        caller: &Caller,
        term: &str,
        scope: SearchScope,
        limit: Option<i64>,
    ) -> Result<SearchResults> {
        let limit = effective_limit(limit.unwrap_or(SEARCH_CATEGORY_LIMIT))?;
        let mut results = SearchResults::default();

        if term.trim().is_empty() {
            return Ok(results);
        }
        let pattern = like_pattern(term);

        if matches!(scope, SearchScope::All | SearchScope::Songs) {
            let mut clauses = Vec::new();
            let mut binds = Vec::new();
            push_visibility(&mut clauses, &mut binds, caller);
            clauses.push(
                "(LOWER(songs.title) LIKE ? \
                 OR LOWER(COALESCE(genres.title, '')) LIKE ? \
                 OR LOWER(COALESCE(albums.title, '')) LIKE ? \
                 OR LOWER(COALESCE(users.username, '')) LIKE ?)"
                    .to_string(),
            );
            for _ in 0..4 {
                binds.push(Bind::Text(pattern.clone()));
            }
            binds.push(Bind::Int(limit));

            let sql = format!(
                "SELECT songs.* FROM songs \
                 LEFT JOIN genres ON genres.id = songs.genre_id \
                 LEFT JOIN albums ON albums.id = songs.album_id \
                 LEFT JOIN users ON users.id = songs.user_id \
                 WHERE {} \
                 ORDER BY songs.play_count DESC, songs.likes DESC LIMIT ?",
                clauses.join(" AND ")
            );
            results.songs = bind_all!(sqlx::query_as::<_, Song>(&sql), &binds)
                .fetch_all(&self.pool)
                .await?;
        }

        if matches!(scope, SearchScope::All | SearchScope::Albums) {
            results.albums = sqlx::query_as::<_, Album>(
                "SELECT albums.* FROM albums \
                 LEFT JOIN users ON users.id = albums.user_id \
                 WHERE LOWER(albums.title) LIKE ? \
                    OR LOWER(COALESCE(users.username, '')) LIKE ? \
                 ORDER BY albums.title LIMIT ?",
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        }

        if matches!(scope, SearchScope::All | SearchScope::Artists) {
            results.artists = sqlx::query_as::<_, ArtistSummary>(
                "SELECT id, username FROM users \
                 WHERE role = ? AND LOWER(username) LIKE ? \
                 ORDER BY username LIMIT ?",
            )
            .bind(crate::models::Role::Artist)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        }

        Ok(results)
    }

    /// Genre-affinity recommendations.
    ///
    /// Visible songs sharing a genre with the caller's favorites, excluding
    /// songs already favorited, ranked like trending. Anonymous callers and
    /// users without favorites fall back to the all-time trending feed.
    pub async fn recommendations(&self, caller: &Caller, limit: i64) -> Result<Vec<Song>> {
        let Some(user_id) = caller.user_id() else {
            return self.trending(caller, TimeRange::All, limit).await;
        };
        let limit = effective_limit(limit)?;

        let genre_ids: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT songs.genre_id FROM favorite_songs \
             INNER JOIN songs ON songs.id = favorite_songs.song_id \
             WHERE favorite_songs.user_id = ? AND songs.genre_id IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if genre_ids.is_empty() {
            return self.trending(caller, TimeRange::All, limit).await;
        }

        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);

        let placeholders = vec!["?"; genre_ids.len()].join(", ");
        clauses.push(format!("songs.genre_id IN ({placeholders})"));
        for (genre_id,) in genre_ids {
            binds.push(Bind::Text(genre_id));
        }

        clauses.push(
            "songs.id NOT IN (SELECT song_id FROM favorite_songs WHERE user_id = ?)".to_string(),
        );
        binds.push(Bind::Text(user_id.to_string()));
        binds.push(Bind::Int(limit));

        let sql = format!(
            "SELECT songs.* FROM songs WHERE {} \
             ORDER BY songs.play_count DESC, songs.likes DESC LIMIT ?",
            clauses.join(" AND ")
        );

        let songs = bind_all!(sqlx::query_as::<_, Song>(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;
        Ok(songs)
    }

    /// Uniform random sample of the catalog visible to the caller.
    pub async fn random(&self, caller: &Caller, limit: i64) -> Result<Vec<Song>> {
        let limit = effective_limit(limit)?;

        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);
        binds.push(Bind::Int(limit));

        let sql = format!(
            "SELECT songs.* FROM songs WHERE {} ORDER BY RANDOM() LIMIT ?",
            clauses.join(" AND ")
        );

        let songs = bind_all!(sqlx::query_as::<_, Song>(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;
        Ok(songs)
    }

    /// Paginated song listing with optional filters ANDed together.
    pub async fn list_songs(
        &self,
        caller: &Caller,
        filter: &SongFilter,
        page_request: PageRequest,
    ) -> Result<Page<Song>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);

        if let Some(genre) = &filter.genre {
            clauses.push("LOWER(COALESCE(genres.title, '')) LIKE ?".to_string());
            binds.push(Bind::Text(like_pattern(genre)));
        }
        if let Some(artist) = &filter.artist {
            clauses.push("LOWER(COALESCE(users.username, '')) LIKE ?".to_string());
            binds.push(Bind::Text(like_pattern(artist)));
        }
        if let Some(album_title) = &filter.album_title {
            clauses.push("LOWER(COALESCE(albums.title, '')) LIKE ?".to_string());
            binds.push(Bind::Text(like_pattern(album_title)));
        }
        if let Some(from) = filter.released_from {
            clauses.push("songs.release_date >= ?".to_string());
            binds.push(Bind::Date(from));
        }
        if let Some(to) = filter.released_to {
            clauses.push("songs.release_date <= ?".to_string());
            binds.push(Bind::Date(to));
        }

        let joins = "LEFT JOIN genres ON genres.id = songs.genre_id \
                     LEFT JOIN albums ON albums.id = songs.album_id \
                     LEFT JOIN users ON users.id = songs.user_id";
        let where_clause = clauses.join(" AND ");

        let count_sql =
            format!("SELECT COUNT(*) FROM songs {joins} WHERE {where_clause}");
        let total: (i64,) = bind_all!(sqlx::query_as(&count_sql), &binds)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT songs.* FROM songs {joins} WHERE {where_clause} \
             ORDER BY songs.created_at DESC LIMIT ? OFFSET ?"
        );
        binds.push(Bind::Int(page_request.limit() as i64));
        binds.push(Bind::Int(page_request.offset() as i64));

        let songs = bind_all!(sqlx::query_as::<_, Song>(&select_sql), &binds)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(songs, total.0 as u64, page_request))
    }

    /// Songs on an album, visibility-scoped, in release order.
    pub async fn songs_by_album(
        &self,
        caller: &Caller,
        album_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Song>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);
        clauses.push("songs.album_id = ?".to_string());
        binds.push(Bind::Text(album_id.to_string()));

        self.page_of_songs(clauses, binds, "songs.release_date ASC", page_request)
            .await
    }

    /// An artist's songs, visibility-scoped, newest first.
    pub async fn songs_by_artist(
        &self,
        caller: &Caller,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Song>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_visibility(&mut clauses, &mut binds, caller);
        clauses.push("songs.user_id = ?".to_string());
        binds.push(Bind::Text(artist_id.to_string()));

        self.page_of_songs(clauses, binds, "songs.created_at DESC", page_request)
            .await
    }

    /// A song with its genre, album, and owner resolved. Invisible songs
    /// are reported as not found rather than revealing their existence.
    pub async fn song_details(&self, caller: &Caller, song_id: &str) -> Result<SongDetails> {
        let song = sqlx::query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(song_id)
            .fetch_optional(&self.pool)
            .await?
            .filter(|song| policy::can_view_song(song, caller))
            .ok_or_else(|| CatalogError::not_found("song", song_id))?;

        let genre = match &song.genre_id {
            Some(id) => {
                sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };
        let album = match &song.album_id {
            Some(id) => {
                sqlx::query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };
        let artist = match &song.user_id {
            Some(id) => {
                sqlx::query_as::<_, ArtistSummary>("SELECT id, username FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        Ok(SongDetails {
            song,
            genre,
            album,
            artist,
        })
    }

    async fn page_of_songs(
        &self,
        clauses: Vec<String>,
        mut binds: Vec<Bind>,
        order_by: &str,
        page_request: PageRequest,
    ) -> Result<Page<Song>> {
        let where_clause = clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM songs WHERE {where_clause}");
        let total: (i64,) = bind_all!(sqlx::query_as(&count_sql), &binds)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT songs.* FROM songs WHERE {where_clause} ORDER BY {order_by} LIMIT ? OFFSET ?"
        );
        binds.push(Bind::Int(page_request.limit() as i64));
        binds.push(Bind::Int(page_request.offset() as i64));

        let songs = bind_all!(sqlx::query_as::<_, Song>(&select_sql), &binds)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(songs, total.0 as u64, page_request))
    }
}
