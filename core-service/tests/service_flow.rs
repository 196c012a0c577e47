//! End-to-end flow over an assembled core: registration, upload, plays,
//! likes, favorites, feeds, and subscription.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;

use bridge_local::{MemoryBillingProvider, MemoryBlobStore};
use core_billing::PlanKind;
use core_catalog::ingest::{FileUpload, SongDraft};
use core_catalog::ledger::AddOutcome;
use core_catalog::models::Song;
use core_catalog::query::{SearchScope, TimeRange};
use core_catalog::repositories::{NewUser, UserRepository};
use core_catalog::{Caller, Role, Visibility};
use core_runtime::CoreConfig;
use core_service::AriaService;

async fn service() -> (AriaService, Arc<MemoryBlobStore>, Arc<MemoryBillingProvider>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let billing = Arc::new(MemoryBillingProvider::new());
    let config = CoreConfig::builder()
        .seed_plans(true)
        .blob_store(blobs.clone())
        .billing_provider(billing.clone())
        .build()
        .unwrap();
    (AriaService::init(config).await.unwrap(), blobs, billing)
}

fn draft(title: &str, genre: &str) -> SongDraft {
    SongDraft {
        title: title.to_string(),
        duration_secs: 180,
        genre_title: genre.to_string(),
        album_title: None,
        release_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        visibility: Visibility::Public,
        licensing_info: None,
    }
}

fn audio(name: &str) -> FileUpload {
    FileUpload {
        file_name: name.to_string(),
        data: Bytes::from_static(b"riff-data"),
    }
}

async fn upload(service: &AriaService, artist: &Caller, title: &str, genre: &str) -> Song {
    service
        .uploads()
        .create_song(artist, draft(title, genre), Some(audio(&format!("{title}.mp3"))))
        .await
        .unwrap()
}

#[tokio::test]
async fn full_catalog_and_engagement_flow() {
    let (service, blobs, _) = service().await;

    let artist_user = service
        .users()
        .insert(NewUser {
            username: "aurora".to_string(),
            email: "aurora@example.com".to_string(),
            role: Role::Artist,
        })
        .await
        .unwrap();
    let listener_user = service
        .users()
        .insert(NewUser {
            username: "fan".to_string(),
            email: "fan@example.com".to_string(),
            role: Role::Listener,
        })
        .await
        .unwrap();
    let artist = Caller::artist(&artist_user.id);
    let listener = Caller::listener(&listener_user.id);

    // Upload two songs; the shared genre is created once.
    let first = upload(&service, &artist, "first-light", "Synthwave").await;
    let second = upload(&service, &artist, "afterglow", "Synthwave").await;
    assert_eq!(first.genre_id, second.genre_id);
    assert_eq!(blobs.len(), 2);

    // Plays and likes drive the trending order.
    for _ in 0..3 {
        service.ledger().record_play(&first.id, &listener).await.unwrap();
    }
    service.ledger().record_play(&second.id, &listener).await.unwrap();
    assert_eq!(service.ledger().like(&listener_user.id, &second.id).await.unwrap(), 1);

    let feed = service
        .query()
        .trending(&Caller::anonymous(), TimeRange::All, 10)
        .await
        .unwrap();
    let titles: Vec<_> = feed.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["first-light", "afterglow"]);

    // Replaying collapsed into one history row per song.
    let history = service
        .ledger()
        .recently_played(&listener_user.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);

    // Favorites feed recommendations within the same genre.
    assert_eq!(
        service
            .ledger()
            .favorite_song(&listener_user.id, &first.id)
            .await
            .unwrap(),
        AddOutcome::Added
    );
    let recs = service.query().recommendations(&listener, 10).await.unwrap();
    let rec_titles: Vec<_> = recs.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(rec_titles, vec!["afterglow"]);

    // Search finds the artist's songs by username.
    let results = service
        .query()
        .search(&Caller::anonymous(), "aurora", SearchScope::All, None)
        .await
        .unwrap();
    assert_eq!(results.songs.len(), 2);
    assert_eq!(results.artists.len(), 1);

    // Follows.
    service
        .ledger()
        .follow(&listener_user.id, &artist_user.id)
        .await
        .unwrap();
    let followers = service.ledger().followers(&artist_user.id).await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].username, "fan");
}

#[tokio::test]
async fn subscription_flow_over_the_facade() {
    let (service, _, billing) = service().await;

    let user = service
        .users()
        .insert(NewUser {
            username: "kei".to_string(),
            email: "kei@example.com".to_string(),
            role: Role::Listener,
        })
        .await
        .unwrap();

    let plans = service.subscriptions().list_plans().await.unwrap();
    assert_eq!(plans.len(), 5);

    let receipt = service
        .subscriptions()
        .subscribe(&user.id, PlanKind::Individual)
        .await
        .unwrap();
    assert_eq!(receipt.status, "active");
    assert_eq!(billing.customer_count(), 1);

    service.subscriptions().cancel(&user.id).await.unwrap();
    let stored = service.users().find_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.subscription_status.as_deref(), Some("cancel_pending"));
}

#[tokio::test]
async fn deleting_a_song_removes_its_blob_and_interactions() {
    let (service, blobs, _) = service().await;

    let artist_user = service
        .users()
        .insert(NewUser {
            username: "sol".to_string(),
            email: "sol@example.com".to_string(),
            role: Role::Artist,
        })
        .await
        .unwrap();
    let artist = Caller::artist(&artist_user.id);

    let song = upload(&service, &artist, "ephemeral", "Ambient").await;
    service.ledger().like(&artist_user.id, &song.id).await.unwrap();
    assert_eq!(blobs.len(), 1);

    service.uploads().delete_song(&artist, &song.id).await.unwrap();
    assert!(blobs.is_empty());

    let likes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM song_likes")
        .fetch_one(service.pool())
        .await
        .unwrap();
    assert_eq!(likes.0, 0);
}
