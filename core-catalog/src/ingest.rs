//! Upload service: validated ingestion of songs and albums.
//!
//! File constraints are checked strictly before the blob store is called,
//! and the catalog row is only written after the store has returned a URL.
//! A failed upload therefore never leaves a partially created song or album
//! behind.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use bridge_traits::BlobStore;

use crate::error::{CatalogError, Result};
use crate::models::{Album, Song, Visibility};
use crate::policy::{self, Caller};
use crate::repositories::{
    AlbumRepository, GenreRepository, SongRepository, SqliteAlbumRepository,
    SqliteGenreRepository, SqliteSongRepository,
};

/// Accepted audio file extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac"];
/// Maximum audio upload size: 50 MB.
pub const MAX_AUDIO_BYTES: usize = 50 * 1024 * 1024;

/// Accepted cover image extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
/// Maximum image upload size: 10 MB.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded file: client-supplied name plus raw bytes.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub data: Bytes,
}

/// Input for creating a song. Genre is referenced by title and resolved
/// lazily; the album is optional.
#[derive(Debug, Clone)]
pub struct SongDraft {
    pub title: String,
    pub duration_secs: i64,
    pub genre_title: String,
    pub album_title: Option<String>,
    pub release_date: NaiveDate,
    pub visibility: Visibility,
    pub licensing_info: Option<String>,
}

/// Partial update for a song; `None` fields are left unchanged. A new genre
/// or album title is re-resolved through the lazy lookup.
#[derive(Debug, Clone, Default)]
pub struct SongChanges {
    pub title: Option<String>,
    pub duration_secs: Option<i64>,
    pub genre_title: Option<String>,
    pub album_title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub visibility: Option<Visibility>,
    pub licensing_info: Option<String>,
}

/// Input for explicitly creating an album.
#[derive(Debug, Clone)]
pub struct AlbumDraft {
    pub title: String,
    pub release_date: Option<NaiveDate>,
}

/// Validated ingestion of songs and albums.
pub struct UploadService {
    blob_store: Arc<dyn BlobStore>,
    songs: SqliteSongRepository,
    genres: SqliteGenreRepository,
    albums: SqliteAlbumRepository,
}

impl UploadService {
    pub fn new(pool: SqlitePool, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            blob_store,
            songs: SqliteSongRepository::new(pool.clone()),
            genres: SqliteGenreRepository::new(pool.clone()),
            albums: SqliteAlbumRepository::new(pool),
        }
    }

    /// Upload a song. Artist-only.
    pub async fn create_song(
        &self,
        caller: &Caller,
        draft: SongDraft,
        audio: Option<FileUpload>,
    ) -> Result<Song> {
        let owner = policy::ensure_artist(caller, "uploading songs")?.to_string();

        let audio = audio.ok_or_else(|| {
            CatalogError::validation("audio_file", "no audio file provided")
        })?;
        validate_audio(&audio)?;

        let genre_title = draft.genre_title.trim();
        if genre_title.is_empty() {
            return Err(CatalogError::validation("genre", "genre is required"));
        }

        // Validate the row before touching the blob store, so a rejected
        // draft costs nothing.
        let now = Utc::now().timestamp();
        let mut song = Song {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            duration_secs: draft.duration_secs,
            release_date: draft.release_date,
            audio_url: "pending".to_string(),
            play_count: 0,
            likes: 0,
            visibility: draft.visibility,
            licensing_info: draft.licensing_info,
            user_id: Some(owner.clone()),
            album_id: None,
            genre_id: None,
            created_at: now,
            updated_at: now,
        };
        song.validate()
            .map_err(|message| CatalogError::validation("song", message))?;

        song.audio_url = self
            .blob_store
            .put(audio.data, &audio.file_name)
            .await
            .map_err(CatalogError::External)?;

        let genre = self.genres.resolve_or_create(genre_title, Some(&owner)).await?;
        song.genre_id = Some(genre.id);

        if let Some(album_title) = draft
            .album_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let album = self.albums.resolve_or_create(album_title, Some(&owner)).await?;
            song.album_id = Some(album.id);
        }

        self.songs.insert(&song).await?;
        info!(song = %song.id, owner = %owner, "song uploaded");
        Ok(song)
    }

    /// Apply changes to a song. Owner-only.
    pub async fn update_song(
        &self,
        caller: &Caller,
        song_id: &str,
        changes: SongChanges,
    ) -> Result<Song> {
        let mut song = self
            .songs
            .find_by_id(song_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("song", song_id))?;
        policy::ensure_owner(caller, song.user_id.as_deref(), "updating a song")?;

        if let Some(title) = changes.title {
            song.title = title;
        }
        if let Some(duration_secs) = changes.duration_secs {
            song.duration_secs = duration_secs;
        }
        if let Some(release_date) = changes.release_date {
            song.release_date = release_date;
        }
        if let Some(visibility) = changes.visibility {
            song.visibility = visibility;
        }
        if let Some(licensing_info) = changes.licensing_info {
            song.licensing_info = Some(licensing_info);
        }
        if let Some(genre_title) = changes
            .genre_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let owner = song.user_id.clone();
            let genre = self
                .genres
                .resolve_or_create(genre_title, owner.as_deref())
                .await?;
            song.genre_id = Some(genre.id);
        }
        if let Some(album_title) = changes
            .album_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let owner = song.user_id.clone();
            let album = self
                .albums
                .resolve_or_create(album_title, owner.as_deref())
                .await?;
            song.album_id = Some(album.id);
        }

        self.songs.update(&song).await?;
        Ok(song)
    }

    /// Delete a song. Owner-only; interaction rows cascade and the stored
    /// audio is removed best-effort.
    pub async fn delete_song(&self, caller: &Caller, song_id: &str) -> Result<()> {
        let song = self
            .songs
            .find_by_id(song_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("song", song_id))?;
        policy::ensure_owner(caller, song.user_id.as_deref(), "deleting a song")?;

        self.songs.delete(song_id).await?;

        if let Err(e) = self.blob_store.delete(&song.audio_url).await {
            warn!(song = %song_id, error = %e, "failed to delete audio blob");
        }
        info!(song = %song_id, "song deleted");
        Ok(())
    }

    /// Create an album explicitly, optionally with a cover image.
    /// Artist-only.
    pub async fn create_album(
        &self,
        caller: &Caller,
        draft: AlbumDraft,
        cover: Option<FileUpload>,
    ) -> Result<Album> {
        let owner = policy::ensure_artist(caller, "creating albums")?.to_string();

        let mut album = Album::new(draft.title, Some(owner));
        album.release_date = draft.release_date;
        album
            .validate()
            .map_err(|message| CatalogError::validation("album", message))?;

        if let Some(cover) = cover {
            validate_image(&cover)?;
            let url = self
                .blob_store
                .put(cover.data, &cover.file_name)
                .await
                .map_err(CatalogError::External)?;
            album.cover_image_url = Some(url);
        }

        self.albums.insert(&album).await?;
        info!(album = %album.id, "album created");
        Ok(album)
    }

    /// Delete an album. Owner-only; songs on the album cascade.
    pub async fn delete_album(&self, caller: &Caller, album_id: &str) -> Result<()> {
        let album = self
            .albums
            .find_by_id(album_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("album", album_id))?;
        policy::ensure_owner(caller, album.user_id.as_deref(), "deleting an album")?;

        self.albums.delete(album_id).await?;
        Ok(())
    }
}

/// Check an audio upload against the allow-list and size ceiling.
pub fn validate_audio(upload: &FileUpload) -> Result<()> {
    validate_file(upload, "audio_file", AUDIO_EXTENSIONS, MAX_AUDIO_BYTES)
}

/// Check a cover image upload against the allow-list and size ceiling.
pub fn validate_image(upload: &FileUpload) -> Result<()> {
    validate_file(upload, "cover_image", IMAGE_EXTENSIONS, MAX_IMAGE_BYTES)
}

fn validate_file(
    upload: &FileUpload,
    field: &str,
    allowed: &[&str],
    max_bytes: usize,
) -> Result<()> {
    if upload.data.is_empty() {
        return Err(CatalogError::validation(field, "file is empty"));
    }
    if upload.data.len() > max_bytes {
        return Err(CatalogError::validation(
            field,
            format!(
                "file exceeds the {} MB limit",
                max_bytes / (1024 * 1024)
            ),
        ));
    }

    let extension = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(CatalogError::validation(
            field,
            format!("file type not allowed; accepted: {}", allowed.join(", ")),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::repositories::song::test_support::seed_user;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::always;

    mock! {
        pub Blob {}

        #[async_trait]
        impl BlobStore for Blob {
            async fn put(&self, data: Bytes, suggested_name: &str) -> bridge_traits::Result<String>;
            async fn delete(&self, url: &str) -> bridge_traits::Result<()>;
        }
    }

    fn accepting_blob_store() -> MockBlob {
        let mut blob = MockBlob::new();
        blob.expect_put()
            .returning(|_, name| Ok(format!("https://blobs/{name}")));
        blob.expect_delete().returning(|_| Ok(()));
        blob
    }

    fn draft(title: &str) -> SongDraft {
        SongDraft {
            title: title.to_string(),
            duration_secs: 200,
            genre_title: "Rock".to_string(),
            album_title: None,
            release_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            visibility: Visibility::Public,
            licensing_info: None,
        }
    }

    fn audio(name: &str) -> FileUpload {
        FileUpload {
            file_name: name.to_string(),
            data: Bytes::from_static(b"riff"),
        }
    }

    async fn setup(blob: MockBlob) -> (SqlitePool, UploadService, Caller) {
        let pool = create_test_pool().await.unwrap();
        let artist = seed_user(&pool, "aurora", 2).await;
        let service = UploadService::new(pool.clone(), Arc::new(blob));
        (pool, service, Caller::artist(artist))
    }

    #[tokio::test]
    async fn upload_persists_song_with_resolved_genre() {
        let (pool, service, artist) = setup(accepting_blob_store()).await;

        let song = service
            .create_song(&artist, draft("First Light"), Some(audio("first.mp3")))
            .await
            .unwrap();
        assert_eq!(song.audio_url, "https://blobs/first.mp3");
        assert_eq!(song.play_count, 0);
        assert_eq!(song.likes, 0);
        assert!(song.genre_id.is_some());

        let genres: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres WHERE title = 'Rock'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(genres.0, 1);
    }

    #[tokio::test]
    async fn second_upload_reuses_the_genre() {
        let (pool, service, artist) = setup(accepting_blob_store()).await;

        let first = service
            .create_song(&artist, draft("one"), Some(audio("one.mp3")))
            .await
            .unwrap();
        let second = service
            .create_song(&artist, draft("two"), Some(audio("two.mp3")))
            .await
            .unwrap();
        assert_eq!(first.genre_id, second.genre_id);

        let genres: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(genres.0, 1);
    }

    #[tokio::test]
    async fn missing_audio_is_rejected_before_the_store() {
        let mut blob = MockBlob::new();
        blob.expect_put().never();
        let (_, service, artist) = setup(blob).await;

        let err = service
            .create_song(&artist, draft("no-audio"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn invalid_files_are_rejected_before_the_store() {
        let mut blob = MockBlob::new();
        blob.expect_put().never();
        let (_, service, artist) = setup(blob).await;

        // Disallowed extension.
        let err = service
            .create_song(&artist, draft("exe"), Some(audio("song.exe")))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));

        // Empty file.
        let empty = FileUpload {
            file_name: "empty.mp3".to_string(),
            data: Bytes::new(),
        };
        let err = service
            .create_song(&artist, draft("empty"), Some(empty))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_genre_is_rejected() {
        let mut blob = MockBlob::new();
        blob.expect_put().never();
        let (_, service, artist) = setup(blob).await;

        let mut no_genre = draft("quiet");
        no_genre.genre_title = "  ".to_string();
        let err = service
            .create_song(&artist, no_genre, Some(audio("quiet.mp3")))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_catalog_row() {
        let mut blob = MockBlob::new();
        blob.expect_put()
            .with(always(), always())
            .returning(|_, _| {
                Err(bridge_traits::BridgeError::UploadFailed(
                    "bucket unreachable".to_string(),
                ))
            });
        let (pool, service, artist) = setup(blob).await;

        let err = service
            .create_song(&artist, draft("lost"), Some(audio("lost.mp3")))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::External(_)));

        let songs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&pool)
            .await
            .unwrap();
        let genres: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(songs.0, 0);
        assert_eq!(genres.0, 0);
    }

    #[tokio::test]
    async fn listeners_cannot_upload() {
        let (pool, service, _) = setup(accepting_blob_store()).await;
        let listener = seed_user(&pool, "fan", 1).await;

        let err = service
            .create_song(
                &Caller::listener(listener),
                draft("forbidden"),
                Some(audio("f.mp3")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn update_re_resolves_genre_and_respects_ownership() {
        let (pool, service, artist) = setup(accepting_blob_store()).await;

        let song = service
            .create_song(&artist, draft("mutable"), Some(audio("m.mp3")))
            .await
            .unwrap();

        let changes = SongChanges {
            title: Some("Mutable (Remaster)".to_string()),
            genre_title: Some("Jazz".to_string()),
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        let updated = service.update_song(&artist, &song.id, changes).await.unwrap();
        assert_eq!(updated.title, "Mutable (Remaster)");
        assert_eq!(updated.visibility, Visibility::Private);
        assert_ne!(updated.genre_id, song.genre_id);

        let rival = seed_user(&pool, "rival", 2).await;
        let err = service
            .update_song(
                &Caller::artist(rival),
                &song.id,
                SongChanges {
                    title: Some("hijack".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn delete_song_requires_ownership() {
        let (pool, service, artist) = setup(accepting_blob_store()).await;

        let song = service
            .create_song(&artist, draft("gone"), Some(audio("g.mp3")))
            .await
            .unwrap();

        let listener = seed_user(&pool, "fan", 1).await;
        assert!(matches!(
            service.delete_song(&Caller::listener(listener), &song.id).await,
            Err(CatalogError::Forbidden { .. })
        ));

        service.delete_song(&artist, &song.id).await.unwrap();
        let songs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(songs.0, 0);
    }

    #[tokio::test]
    async fn album_creation_with_cover() {
        let (_, service, artist) = setup(accepting_blob_store()).await;

        let album = service
            .create_album(
                &artist,
                AlbumDraft {
                    title: "Glasswork".to_string(),
                    release_date: NaiveDate::from_ymd_opt(2024, 2, 2),
                },
                Some(FileUpload {
                    file_name: "cover.png".to_string(),
                    data: Bytes::from_static(b"png"),
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            album.cover_image_url.as_deref(),
            Some("https://blobs/cover.png")
        );

        // Oversized covers are rejected.
        let big = FileUpload {
            file_name: "big.png".to_string(),
            data: Bytes::from(vec![0u8; MAX_IMAGE_BYTES + 1]),
        };
        let err = service
            .create_album(
                &artist,
                AlbumDraft {
                    title: "Too Big".to_string(),
                    release_date: None,
                },
                Some(big),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn audio_validation_rules() {
        for name in ["a.mp3", "b.WAV", "c.m4a", "d.flac", "e.ogg", "f.aac"] {
            assert!(validate_audio(&audio(name)).is_ok(), "{name} should pass");
        }
        for name in ["noext", "evil.exe", "tar.gz", "song.mp3.txt"] {
            assert!(validate_audio(&audio(name)).is_err(), "{name} should fail");
        }

        let oversized = FileUpload {
            file_name: "big.mp3".to_string(),
            data: Bytes::from(vec![0u8; MAX_AUDIO_BYTES + 1]),
        };
        assert!(validate_audio(&oversized).is_err());
    }
}
