//! Subscription orchestration.
//!
//! `subscribe` drives the provider in two steps (ensure customer, create
//! subscription) and only then writes the linkage to the user row in a
//! single update; a provider failure therefore leaves no half-written
//! subscription state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use bridge_traits::{BillingProvider, CustomerDraft};
use core_catalog::repositories::{SqliteUserRepository, UserRepository};

use crate::error::{BillingError, Result};
use crate::plans::{PlanKind, PlanRepository, SqlitePlanRepository, SubscriptionPlan};

/// Status stored after a cancellation request; the provider cancels at
/// period end.
pub const STATUS_CANCEL_PENDING: &str = "cancel_pending";

/// Outcome of a successful subscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionReceipt {
    pub subscription_id: String,
    pub plan_id: String,
    pub status: String,
}

/// Orchestrates the billing provider and the stored linkage.
pub struct SubscriptionService {
    provider: Arc<dyn BillingProvider>,
    users: SqliteUserRepository,
    plans: SqlitePlanRepository,
}

impl SubscriptionService {
    pub fn new(pool: SqlitePool, provider: Arc<dyn BillingProvider>) -> Self {
        Self {
            provider,
            users: SqliteUserRepository::new(pool.clone()),
            plans: SqlitePlanRepository::new(pool),
        }
    }

    /// Available plans, cheapest first.
    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        self.plans.list_active().await
    }

    /// Subscribe a user to a plan, creating the provider customer on first
    /// use.
    pub async fn subscribe(&self, user_id: &str, kind: PlanKind) -> Result<SubscriptionReceipt> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(BillingError::Catalog)?
            .ok_or_else(|| BillingError::UserNotFound(user_id.to_string()))?;

        let plan = self
            .plans
            .find_by_kind(kind)
            .await?
            .filter(|plan| plan.is_active)
            .ok_or_else(|| BillingError::UnknownPlan(kind.as_str().to_string()))?;

        let customer_id = match user.billing_customer_id {
            Some(existing) => existing,
            None => {
                let customer_id = self
                    .provider
                    .create_customer(CustomerDraft {
                        user_id: user.id.clone(),
                        email: user.email.clone(),
                        display_name: user.username.clone(),
                    })
                    .await?;
                self.users
                    .set_billing_customer(&user.id, &customer_id)
                    .await
                    .map_err(BillingError::Catalog)?;
                customer_id
            }
        };

        let handle = self
            .provider
            .create_subscription(&customer_id, &plan.id)
            .await?;

        self.users
            .set_subscription(&user.id, &handle.id, &plan.id, &handle.status)
            .await
            .map_err(BillingError::Catalog)?;

        info!(user = %user.id, plan = kind.as_str(), subscription = %handle.id, "subscribed");
        Ok(SubscriptionReceipt {
            subscription_id: handle.id,
            plan_id: plan.id,
            status: handle.status,
        })
    }

    /// Request cancellation of the user's subscription at period end.
    pub async fn cancel(&self, user_id: &str) -> Result<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(BillingError::Catalog)?
            .ok_or_else(|| BillingError::UserNotFound(user_id.to_string()))?;

        let subscription_id = user
            .billing_subscription_id
            .ok_or(BillingError::NoActiveSubscription)?;

        self.provider.cancel_subscription(&subscription_id).await?;

        self.users
            .set_subscription_status(&user.id, STATUS_CANCEL_PENDING)
            .await
            .map_err(BillingError::Catalog)?;

        info!(user = %user.id, subscription = %subscription_id, "cancellation requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_local::MemoryBillingProvider;
    use core_catalog::db::create_test_pool;
    use core_catalog::repositories::NewUser;
    use core_catalog::Role;

    async fn setup() -> (SqlitePool, SubscriptionService, Arc<MemoryBillingProvider>, String) {
        let pool = create_test_pool().await.unwrap();
        let provider = Arc::new(MemoryBillingProvider::new());
        let service = SubscriptionService::new(pool.clone(), provider.clone());

        SqlitePlanRepository::new(pool.clone())
            .seed_defaults()
            .await
            .unwrap();

        let user = SqliteUserRepository::new(pool.clone())
            .insert(NewUser {
                username: "kei".to_string(),
                email: "kei@example.com".to_string(),
                role: Role::Listener,
            })
            .await
            .unwrap();

        (pool, service, provider, user.id)
    }

    #[tokio::test]
    async fn subscribe_links_customer_and_subscription() {
        let (pool, service, provider, user_id) = setup().await;

        let receipt = service
            .subscribe(&user_id, PlanKind::Individual)
            .await
            .unwrap();
        assert_eq!(receipt.status, "active");
        assert_eq!(provider.customer_count(), 1);

        let user = SqliteUserRepository::new(pool)
            .find_by_id(&user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(user.billing_customer_id.is_some());
        assert_eq!(
            user.billing_subscription_id.as_deref(),
            Some(receipt.subscription_id.as_str())
        );
        assert_eq!(user.plan_id.as_deref(), Some(receipt.plan_id.as_str()));
        assert_eq!(user.subscription_status.as_deref(), Some("active"));
    }

    #[tokio::test]
    async fn resubscribing_reuses_the_customer() {
        let (_, service, provider, user_id) = setup().await;

        service.subscribe(&user_id, PlanKind::Free).await.unwrap();
        service
            .subscribe(&user_id, PlanKind::Family)
            .await
            .unwrap();
        assert_eq!(provider.customer_count(), 1);
    }

    #[tokio::test]
    async fn cancel_marks_the_stored_status() {
        let (pool, service, provider, user_id) = setup().await;

        let receipt = service
            .subscribe(&user_id, PlanKind::Student)
            .await
            .unwrap();
        service.cancel(&user_id).await.unwrap();

        assert_eq!(
            provider.subscription_status(&receipt.subscription_id).as_deref(),
            Some("cancel_pending")
        );
        let user = SqliteUserRepository::new(pool)
            .find_by_id(&user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            user.subscription_status.as_deref(),
            Some(STATUS_CANCEL_PENDING)
        );
    }

    #[tokio::test]
    async fn cancel_without_subscription_fails() {
        let (_, service, _, user_id) = setup().await;
        assert!(matches!(
            service.cancel(&user_id).await,
            Err(BillingError::NoActiveSubscription)
        ));
    }

    #[tokio::test]
    async fn unknown_user_fails() {
        let (_, service, _, _) = setup().await;
        assert!(matches!(
            service.subscribe("ghost", PlanKind::Free).await,
            Err(BillingError::UserNotFound(_))
        ));
    }
}
