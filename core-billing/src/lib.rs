//! # Subscription Billing
//!
//! The plan catalog and the subscription service. Actual payment handling
//! lives behind the [`bridge_traits::BillingProvider`] trait; this crate only
//! orchestrates the provider and stores the resulting customer/subscription
//! linkage on the user row.

pub mod error;
pub mod plans;
pub mod service;

pub use error::{BillingError, Result};
pub use plans::{
    BillingCycle, PlanFeatures, PlanKind, PlanRepository, SqlitePlanRepository, SubscriptionPlan,
};
pub use service::{SubscriptionReceipt, SubscriptionService};
