//! Repositories for the catalog entities.
//!
//! Each entity gets a trait describing its data access surface and a SQLite
//! implementation over the shared pool. Higher layers (ledger, query engine,
//! upload service) compose these; visibility policy is applied by those
//! layers, not here.

pub mod album;
pub mod genre;
pub mod pagination;
pub mod song;
pub mod user;

pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use genre::{GenreRepository, SqliteGenreRepository};
pub use pagination::{effective_limit, Page, PageRequest, MAX_PAGE_SIZE};
pub use song::{SongRepository, SqliteSongRepository};
pub use user::{NewUser, SqliteUserRepository, UserRepository};
