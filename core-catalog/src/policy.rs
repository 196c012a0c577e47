//! Visibility and access policy.
//!
//! Reads: a song is visible when it is public, or when the caller is an
//! authenticated artist who owns it. This is deliberately role-based rather
//! than ownership-based - a listener-role account does not see its own
//! private songs. Inherited behavior, kept as-is.
//!
//! Writes: creating catalog entries requires the artist role; updating or
//! deleting an existing entry additionally requires ownership.

use crate::error::{CatalogError, Result};
use crate::models::{Role, Song, Visibility};

/// The identity on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Authenticated { id: String, role: Role },
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    pub fn listener(id: impl Into<String>) -> Self {
        Self::Authenticated {
            id: id.into(),
            role: Role::Listener,
        }
    }

    pub fn artist(id: impl Into<String>) -> Self {
        Self::Authenticated {
            id: id.into(),
            role: Role::Artist,
        }
    }

    /// The authenticated user id, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated { id, .. } => Some(id),
        }
    }

    pub fn is_artist(&self) -> bool {
        matches!(
            self,
            Caller::Authenticated {
                role: Role::Artist,
                ..
            }
        )
    }
}

/// Row-filter equivalent of [`can_view_song`], used to scope catalog reads
/// in SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VisibilityScope {
    /// Only public songs.
    PublicOnly,
    /// Public songs plus private songs owned by this artist.
    PublicOrOwnedBy(String),
}

pub(crate) fn visibility_scope(caller: &Caller) -> VisibilityScope {
    match caller {
        Caller::Anonymous => VisibilityScope::PublicOnly,
        Caller::Authenticated { id, role } => match role {
            Role::Listener => VisibilityScope::PublicOnly,
            Role::Artist => VisibilityScope::PublicOrOwnedBy(id.clone()),
        },
    }
}

/// Whether `caller` may see `song`.
pub fn can_view_song(song: &Song, caller: &Caller) -> bool {
    match song.visibility {
        Visibility::Public => true,
        Visibility::Private => match caller {
            Caller::Anonymous => false,
            Caller::Authenticated { id, role } => match role {
                Role::Listener => false,
                Role::Artist => song.user_id.as_deref() == Some(id.as_str()),
            },
        },
    }
}

/// Require the artist role for a write operation; returns the caller id.
pub fn ensure_artist<'c>(caller: &'c Caller, action: &str) -> Result<&'c str> {
    match caller {
        Caller::Authenticated {
            id,
            role: Role::Artist,
        } => Ok(id),
        Caller::Authenticated {
            role: Role::Listener,
            ..
        }
        | Caller::Anonymous => Err(CatalogError::forbidden(format!(
            "{action} requires the artist role"
        ))),
    }
}

/// Require the artist role plus ownership of the target object.
pub fn ensure_owner(caller: &Caller, owner_id: Option<&str>, action: &str) -> Result<()> {
    let caller_id = ensure_artist(caller, action)?;
    match owner_id {
        Some(owner) if owner == caller_id => Ok(()),
        _ => Err(CatalogError::forbidden(format!(
            "{action} is limited to the owner"
        ))),
    }
}
