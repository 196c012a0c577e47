//! In-process billing provider for development and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bridge_traits::{BillingProvider, BridgeError, CustomerDraft, Result, SubscriptionHandle};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SubscriptionRecord {
    customer_id: String,
    plan_id: String,
    status: String,
}

/// Billing provider that approves every request and keeps its state in
/// process memory. Useful for development environments and integration tests
/// where no payment processor is reachable.
#[derive(Default)]
pub struct MemoryBillingProvider {
    customers: Mutex<HashMap<String, CustomerDraft>>,
    subscriptions: Mutex<HashMap<String, SubscriptionRecord>>,
}

impl MemoryBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer_count(&self) -> usize {
        self.customers.lock().unwrap().len()
    }

    /// Status of a subscription, if it exists.
    pub fn subscription_status(&self, subscription_id: &str) -> Option<String> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .map(|s| s.status.clone())
    }
}

#[async_trait]
impl BillingProvider for MemoryBillingProvider {
    async fn create_customer(&self, draft: CustomerDraft) -> Result<String> {
        let customer_id = format!("cus_{}", Uuid::new_v4().simple());
        info!(customer = %customer_id, user = %draft.user_id, "created billing customer");
        self.customers.lock().unwrap().insert(customer_id.clone(), draft);
        Ok(customer_id)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<SubscriptionHandle> {
        if !self.customers.lock().unwrap().contains_key(customer_id) {
            return Err(BridgeError::Billing(format!(
                "unknown customer {customer_id}"
            )));
        }

        let id = format!("sub_{}", Uuid::new_v4().simple());
        self.subscriptions.lock().unwrap().insert(
            id.clone(),
            SubscriptionRecord {
                customer_id: customer_id.to_string(),
                plan_id: plan_id.to_string(),
                status: "active".to_string(),
            },
        );
        info!(subscription = %id, plan = %plan_id, "created subscription");

        Ok(SubscriptionHandle {
            id,
            status: "active".to_string(),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        match subscriptions.get_mut(subscription_id) {
            Some(record) => {
                record.status = "cancel_pending".to_string();
                Ok(())
            }
            None => Err(BridgeError::Billing(format!(
                "unknown subscription {subscription_id}"
            ))),
        }
    }
}
