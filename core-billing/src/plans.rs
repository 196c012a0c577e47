//! Subscription plan catalog.
//!
//! Plans are stored in the shared database with their feature set serialized
//! as JSON. Each plan kind has a canonical feature set used when seeding.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{BillingError, Result};

/// The closed set of offered plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Free,
    Individual,
    Duo,
    Family,
    Student,
}

impl PlanKind {
    pub const ALL: [PlanKind; 5] = [
        PlanKind::Free,
        PlanKind::Individual,
        PlanKind::Duo,
        PlanKind::Family,
        PlanKind::Student,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanKind::Free => "free",
            PlanKind::Individual => "individual",
            PlanKind::Duo => "duo",
            PlanKind::Family => "family",
            PlanKind::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(PlanKind::Free),
            "individual" => Some(PlanKind::Individual),
            "duo" => Some(PlanKind::Duo),
            "family" => Some(PlanKind::Family),
            "student" => Some(PlanKind::Student),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PlanKind::Free => "Free",
            PlanKind::Individual => "Premium Individual",
            PlanKind::Duo => "Premium Duo",
            PlanKind::Family => "Premium Family",
            PlanKind::Student => "Premium Student",
        }
    }

    /// Monthly price in minor currency units for the seeded catalog.
    pub fn default_price_cents(self) -> i64 {
        match self {
            PlanKind::Free => 0,
            PlanKind::Individual => 999,
            PlanKind::Duo => 1299,
            PlanKind::Family => 1599,
            PlanKind::Student => 499,
        }
    }

    /// Canonical feature set for the plan.
    pub fn features(self) -> PlanFeatures {
        let premium = PlanFeatures {
            ad_free: true,
            offline_mode: true,
            audio_quality: "high".to_string(),
            skip_limit: None,
            max_members: 1,
            parental_controls: false,
        };
        match self {
            PlanKind::Free => PlanFeatures::default(),
            PlanKind::Individual | PlanKind::Student => premium,
            PlanKind::Duo => PlanFeatures {
                max_members: 2,
                ..premium
            },
            PlanKind::Family => PlanFeatures {
                max_members: 6,
                parental_controls: true,
                ..premium
            },
        }
    }
}

/// What a plan entitles a subscriber to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub ad_free: bool,
    pub offline_mode: bool,
    pub audio_quality: String,
    /// Skips per hour; `None` means unlimited.
    pub skip_limit: Option<u32>,
    pub max_members: u32,
    pub parental_controls: bool,
}

impl Default for PlanFeatures {
    fn default() -> Self {
        Self {
            ad_free: false,
            offline_mode: false,
            audio_quality: "medium".to_string(),
            skip_limit: Some(6),
            max_members: 1,
            parental_controls: false,
        }
    }
}

/// Billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Annual => "annual",
        }
    }
}

/// A subscription plan row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub kind: PlanKind,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub max_members: i64,
    pub features: PlanFeatures,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data access for the plan catalog.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert the canonical plans if they are not present yet.
    async fn seed_defaults(&self) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SubscriptionPlan>>;

    async fn find_by_kind(&self, kind: PlanKind) -> Result<Option<SubscriptionPlan>>;

    /// Active plans, cheapest first.
    async fn list_active(&self) -> Result<Vec<SubscriptionPlan>>;
}

/// SQLite implementation of [`PlanRepository`].
pub struct SqlitePlanRepository {
    pool: SqlitePool,
}

impl SqlitePlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn seed_defaults(&self) -> Result<()> {
        let now = Utc::now().timestamp();
        for kind in PlanKind::ALL {
            let features = serde_json::to_string(&kind.features())?;
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO subscription_plans (
                    id, name, plan_kind, price_cents, currency, billing_cycle,
                    max_members, features, is_active, created_at, updated_at
                ) VALUES (?, ?, ?, ?, 'USD', 'monthly', ?, ?, 1, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(kind.display_name())
            .bind(kind.as_str())
            .bind(kind.default_price_cents())
            .bind(kind.features().max_members as i64)
            .bind(features)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

            if inserted.rows_affected() == 1 {
                info!(plan = kind.as_str(), "seeded subscription plan");
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SubscriptionPlan>> {
        let row = sqlx::query("SELECT * FROM subscription_plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_plan(&r)).transpose()
    }

    async fn find_by_kind(&self, kind: PlanKind) -> Result<Option<SubscriptionPlan>> {
        let row = sqlx::query("SELECT * FROM subscription_plans WHERE plan_kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_plan(&r)).transpose()
    }

    async fn list_active(&self) -> Result<Vec<SubscriptionPlan>> {
        let rows =
            sqlx::query("SELECT * FROM subscription_plans WHERE is_active = 1 ORDER BY price_cents")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_plan).collect()
    }
}

fn row_to_plan(row: &SqliteRow) -> Result<SubscriptionPlan> {
    let kind_raw: String = row.try_get("plan_kind")?;
    let kind = PlanKind::parse(&kind_raw)
        .ok_or_else(|| BillingError::UnknownPlan(kind_raw.clone()))?;

    let cycle_raw: String = row.try_get("billing_cycle")?;
    let billing_cycle = match cycle_raw.as_str() {
        "annual" => BillingCycle::Annual,
        _ => BillingCycle::Monthly,
    };

    let features_raw: String = row.try_get("features")?;
    let features: PlanFeatures = serde_json::from_str(&features_raw)?;

    Ok(SubscriptionPlan {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind,
        price_cents: row.try_get("price_cents")?,
        currency: row.try_get("currency")?,
        billing_cycle,
        max_members: row.try_get("max_members")?,
        features,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
