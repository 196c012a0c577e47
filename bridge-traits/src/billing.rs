//! Billing provider abstraction.
//!
//! Subscription billing is handled by an external processor. The core only
//! stores the opaque ids the provider hands back; it never sees payment
//! details and never computes charges itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Customer details forwarded to the provider on first subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDraft {
    /// Our user id, stored as provider-side metadata.
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// Provider-side subscription reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionHandle {
    /// Opaque provider subscription id.
    pub id: String,
    /// Provider-reported status, e.g. `active` or `incomplete`.
    pub status: String,
}

/// Customer/subscription lifecycle at the payment processor.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Register a customer and return the provider's customer id.
    async fn create_customer(&self, draft: CustomerDraft) -> Result<String>;

    /// Start a subscription for an existing customer on the given plan.
    async fn create_subscription(&self, customer_id: &str, plan_id: &str)
        -> Result<SubscriptionHandle>;

    /// Request cancellation of a subscription at the end of the current
    /// billing period.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()>;
}
