//! User repository: identity, roles, and billing linkage.

use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

use crate::error::{CatalogError, Result};
use crate::models::{Role, User};
use crate::repositories::{Page, PageRequest};

/// Input for registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Data access for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` when the username is taken.
    async fn insert(&self, new_user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Change a user's role. Existing ownership is unaffected.
    async fn update_role(&self, id: &str, role: Role) -> Result<User>;

    /// Store the billing customer id issued by the payment provider.
    async fn set_billing_customer(&self, id: &str, customer_id: &str) -> Result<()>;

    /// Store the subscription linkage after a successful provider call.
    async fn set_subscription(
        &self,
        id: &str,
        subscription_id: &str,
        plan_id: &str,
        status: &str,
    ) -> Result<()>;

    /// Update only the stored subscription status.
    async fn set_subscription_status(&self, id: &str, status: &str) -> Result<()>;

    /// Delete a user; owned catalog rows and interaction rows cascade.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Artist-role users, paginated by username.
    async fn list_artists(&self, page_request: PageRequest) -> Result<Page<User>>;
}

/// SQLite implementation of [`UserRepository`].
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_existing(&self, id: &str) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("user", id))
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, new_user: NewUser) -> Result<User> {
        let user = User::new(new_user.username, new_user.email, new_user.role);
        user.validate()
            .map_err(|message| CatalogError::validation("user", message))?;

        let result = sqlx::query(
            "INSERT INTO users (id, username, email, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(CatalogError::Conflict {
                entity: "user",
                field: "username",
                value: user.username,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_role(&self, id: &str, role: Role) -> Result<User> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("user", id));
        }
        self.fetch_existing(id).await
    }

    async fn set_billing_customer(&self, id: &str, customer_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET billing_customer_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(customer_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("user", id));
        }
        Ok(())
    }

    async fn set_subscription(
        &self,
        id: &str,
        subscription_id: &str,
        plan_id: &str,
        status: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users
             SET billing_subscription_id = ?, plan_id = ?, subscription_status = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(subscription_id)
        .bind(plan_id)
        .bind(status)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("user", id));
        }
        Ok(())
    }

    async fn set_subscription_status(&self, id: &str, status: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET subscription_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("user", id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_artists(&self, page_request: PageRequest) -> Result<Page<User>> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(Role::Artist)
            .fetch_one(&self.pool)
            .await?;

        let artists = query_as::<_, User>(
            "SELECT * FROM users WHERE role = ? ORDER BY username LIMIT ? OFFSET ?",
        )
        .bind(Role::Artist)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(artists, total.0 as u64, page_request))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role,
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        let user = repo.insert(new_user("nova", Role::Artist)).await.unwrap();
        assert_eq!(user.role, Role::Artist);
        assert!(user.billing_customer_id.is_none());

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "nova");

        let by_name = repo.find_by_username("nova").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        repo.insert(new_user("nova", Role::Listener)).await.unwrap();
        let err = repo
            .insert(new_user("nova", Role::Artist))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { .. }));
    }

    #[tokio::test]
    async fn role_change_does_not_touch_other_fields() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        let user = repo.insert(new_user("vel", Role::Listener)).await.unwrap();
        let updated = repo.update_role(&user.id, Role::Artist).await.unwrap();
        assert_eq!(updated.role, Role::Artist);
        assert_eq!(updated.username, "vel");
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn billing_linkage_roundtrip() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        let user = repo.insert(new_user("kei", Role::Listener)).await.unwrap();
        repo.set_billing_customer(&user.id, "cus_123").await.unwrap();
        repo.set_subscription(&user.id, "sub_456", "plan-1", "active")
            .await
            .unwrap();

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(stored.billing_subscription_id.as_deref(), Some("sub_456"));
        assert_eq!(stored.subscription_status.as_deref(), Some("active"));

        repo.set_subscription_status(&user.id, "cancel_pending")
            .await
            .unwrap();
        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(
            stored.subscription_status.as_deref(),
            Some("cancel_pending")
        );
    }

    #[tokio::test]
    async fn missing_user_updates_are_not_found() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        assert!(matches!(
            repo.update_role("ghost", Role::Artist).await,
            Err(CatalogError::NotFound { .. })
        ));
        assert!(matches!(
            repo.set_billing_customer("ghost", "cus_1").await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_artists_filters_by_role() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        repo.insert(new_user("ana", Role::Artist)).await.unwrap();
        repo.insert(new_user("bob", Role::Listener)).await.unwrap();
        repo.insert(new_user("cyn", Role::Artist)).await.unwrap();

        let page = repo
            .list_artists(PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["ana", "cyn"]);
    }

    #[tokio::test]
    async fn delete_returns_whether_a_row_was_removed() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUserRepository::new(pool);

        let user = repo.insert(new_user("tmp", Role::Listener)).await.unwrap();
        assert!(repo.delete(&user.id).await.unwrap());
        assert!(!repo.delete(&user.id).await.unwrap());
    }
}
