//! In-memory stand-ins for the Postgres repositories and the Stripe gateway.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::{Result as AnyResult, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entitlement_core::{
    domain::{
        entities::{
            audit_logs::InsertAuditLogEntity, entitlements::EntitlementEntity,
            webhook_events::WebhookEventEntity,
        },
        repositories::{
            app_users::AppUserRepository, audit_logs::AuditLogRepository,
            entitlements::EntitlementRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
            usage::UsageRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::{
            entitlements::{EntitlementPatch, UserPlanProjection},
            enums::{resource_kinds::ResourceKind, webhook_event_statuses::WebhookEventStatus},
            plans::{PlanTier, ProductPlan},
            provider_subscriptions::{ProviderSubscription, ProviderSubscriptionStatus},
        },
    },
    payments::stripe_client::{
        StripeEvent, WebhookVerificationError, ts_to_datetime, verify_signature,
    },
};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

use super::stripe_gateway::StripeGateway;

pub const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
struct StoreState {
    users: HashMap<Uuid, UserPlanProjection>,
    entitlements: HashMap<Uuid, EntitlementEntity>,
    customers: HashMap<(String, String), Uuid>,
    webhook_events: HashMap<String, WebhookEventEntity>,
    audit_logs: Vec<InsertAuditLogEntity>,
    attendance: HashMap<Uuid, i64>,
}

/// One store backs every repository trait, so a test can inspect the combined state.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    entitlement_writes: AtomicUsize,
    fail_entitlement_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn with_user(user_id: Uuid) -> Self {
        let store = Self::default();
        store.add_user(user_id);
        store
    }

    pub fn add_user(&self, user_id: Uuid) {
        self.state.lock().unwrap().users.insert(
            user_id,
            UserPlanProjection {
                user_id,
                plan: PlanTier::Free,
                plan_expires_at: None,
            },
        );
    }

    pub fn set_attendance(&self, user_id: Uuid, count: i64) {
        self.state
            .lock()
            .unwrap()
            .attendance
            .insert(user_id, count);
    }

    pub fn fail_entitlement_writes(&self, fail: bool) {
        self.fail_entitlement_writes.store(fail, Ordering::SeqCst);
    }

    pub fn entitlement(&self, user_id: Uuid) -> Option<EntitlementEntity> {
        self.state
            .lock()
            .unwrap()
            .entitlements
            .get(&user_id)
            .cloned()
    }

    pub fn projection(&self, user_id: Uuid) -> Option<UserPlanProjection> {
        self.state.lock().unwrap().users.get(&user_id).cloned()
    }

    pub fn customer_owner(&self, customer_ref: &str) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap()
            .customers
            .get(&("stripe".to_string(), customer_ref.to_string()))
            .copied()
    }

    pub fn ledger_row(&self, event_id: &str) -> Option<WebhookEventEntity> {
        self.state
            .lock()
            .unwrap()
            .webhook_events
            .get(event_id)
            .cloned()
    }

    pub fn set_processed_at(&self, event_id: &str, processed_at: DateTime<Utc>) {
        if let Some(row) = self.state.lock().unwrap().webhook_events.get_mut(event_id) {
            row.processed_at = processed_at;
        }
    }

    pub fn ledger_len(&self) -> usize {
        self.state.lock().unwrap().webhook_events.len()
    }

    pub fn audit_logs(&self) -> Vec<InsertAuditLogEntity> {
        self.state.lock().unwrap().audit_logs.clone()
    }

    pub fn entitlement_writes(&self) -> usize {
        self.entitlement_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppUserRepository for InMemoryStore {
    async fn find_plan_projection(&self, user_id: Uuid) -> AnyResult<Option<UserPlanProjection>> {
        Ok(self.projection(user_id))
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn record(&self, entry: InsertAuditLogEntity) -> AnyResult<()> {
        let mut state = self.state.lock().unwrap();
        let duplicate = entry.event_id.is_some()
            && state
                .audit_logs
                .iter()
                .any(|existing| existing.event_id == entry.event_id);
        if !duplicate {
            state.audit_logs.push(entry);
        }
        Ok(())
    }
}

#[async_trait]
impl EntitlementRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> AnyResult<Option<EntitlementEntity>> {
        Ok(self.entitlement(user_id))
    }

    async fn find_by_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> AnyResult<Option<EntitlementEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .entitlements
            .values()
            .find(|entitlement| {
                entitlement.external_subscription_id.as_deref() == Some(external_subscription_id)
            })
            .cloned())
    }

    async fn upsert_entitlement(
        &self,
        user_id: Uuid,
        patch: EntitlementPatch,
    ) -> AnyResult<EntitlementEntity> {
        self.write_entitlement(user_id, None, patch)?
            .ok_or_else(|| anyhow::anyhow!("unguarded entitlement write was rejected"))
    }

    async fn upsert_entitlement_if_current(
        &self,
        user_id: Uuid,
        subscription_id: &str,
        patch: EntitlementPatch,
    ) -> AnyResult<Option<EntitlementEntity>> {
        self.write_entitlement(user_id, Some(subscription_id), patch)
    }
}

impl InMemoryStore {
    /// Guard check, merge and projection sync all happen under one lock.
    fn write_entitlement(
        &self,
        user_id: Uuid,
        required_subscription: Option<&str>,
        patch: EntitlementPatch,
    ) -> AnyResult<Option<EntitlementEntity>> {
        if self.fail_entitlement_writes.load(Ordering::SeqCst) {
            bail!("connection reset by peer");
        }

        let mut state = self.state.lock().unwrap();
        if !state.users.contains_key(&user_id) {
            bail!("user {user_id} missing while syncing plan projection");
        }

        let existing = state.entitlements.get(&user_id).cloned();
        if let (Some(required), Some(existing)) = (required_subscription, existing.as_ref()) {
            if existing
                .external_subscription_id
                .as_deref()
                .is_some_and(|current| current != required)
            {
                return Ok(None);
            }
        }

        let now = Utc::now();
        let mut entitlement = existing.unwrap_or_else(|| EntitlementEntity {
            user_id,
            plan: PlanTier::Free.to_string(),
            plan_expires_at: None,
            external_subscription_id: None,
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        });

        if let Some(plan) = patch.plan {
            entitlement.plan = plan.to_string();
        }
        if let Some(plan_expires_at) = patch.plan_expires_at {
            entitlement.plan_expires_at = plan_expires_at;
        }
        if let Some(subscription_id) = patch.external_subscription_id {
            entitlement.external_subscription_id = Some(subscription_id);
        }
        if let Some(status) = patch.status {
            entitlement.status = status.to_string();
        }
        entitlement.updated_at = now;

        state.users.insert(
            user_id,
            UserPlanProjection {
                user_id,
                plan: entitlement.plan_tier(),
                plan_expires_at: entitlement.plan_expires_at,
            },
        );
        state.entitlements.insert(user_id, entitlement.clone());
        self.entitlement_writes.fetch_add(1, Ordering::SeqCst);

        Ok(Some(entitlement))
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for InMemoryStore {
    async fn find_user_id_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> AnyResult<Option<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .get(&(provider.to_string(), customer_ref.to_string()))
            .copied())
    }

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> AnyResult<()> {
        self.state
            .lock()
            .unwrap()
            .customers
            .insert((provider.to_string(), customer_ref.to_string()), user_id);
        Ok(())
    }
}

#[async_trait]
impl UsageRepository for InMemoryStore {
    async fn count_by_user(&self, user_id: Uuid, _resource_kind: ResourceKind) -> AnyResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attendance
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryStore {
    async fn has_processed(&self, event_id: &str) -> AnyResult<bool> {
        Ok(self.ledger_row(event_id).is_some())
    }

    async fn record_tentative(
        &self,
        event_id: &str,
        event_type: &str,
        payload: Value,
    ) -> AnyResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.webhook_events.contains_key(event_id) {
            return Ok(false);
        }

        state.webhook_events.insert(
            event_id.to_string(),
            WebhookEventEntity {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                processed_at: Utc::now(),
                payload_snapshot: payload,
                status: WebhookEventStatus::Success.to_string(),
                error_message: None,
            },
        );
        Ok(true)
    }

    async fn mark_failed(&self, event_id: &str, error_message: &str) -> AnyResult<()> {
        if let Some(row) = self.state.lock().unwrap().webhook_events.get_mut(event_id) {
            row.status = WebhookEventStatus::Failed.to_string();
            row.error_message = Some(error_message.to_string());
        }
        Ok(())
    }

    async fn list_failed(&self, limit: i64) -> AnyResult<Vec<WebhookEventEntity>> {
        let mut failed: Vec<WebhookEventEntity> = self
            .state
            .lock()
            .unwrap()
            .webhook_events
            .values()
            .filter(|row| row.event_status() == Some(WebhookEventStatus::Failed))
            .cloned()
            .collect();

        // Same order as the Postgres query: newest first.
        failed.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        failed.truncate(limit.max(0) as usize);
        Ok(failed)
    }
}

/// Stripe stand-in that verifies real signatures and serves subscriptions from memory.
#[derive(Default)]
pub struct FakeStripe {
    subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    retrievals: AtomicUsize,
}

impl FakeStripe {
    pub fn put_subscription(&self, subscription: ProviderSubscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id.clone(), subscription);
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StripeGateway for FakeStripe {
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerificationError> {
        verify_signature(payload, signature, WEBHOOK_SECRET, Utc::now().timestamp())?;
        Ok(serde_json::from_slice(payload)?)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<ProviderSubscription> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        match self.subscriptions.lock().unwrap().get(subscription_id) {
            Some(subscription) => Ok(subscription.clone()),
            None => bail!("No such subscription: '{subscription_id}'"),
        }
    }
}

pub fn subscription(
    id: &str,
    customer: &str,
    status: &str,
    plan: Option<&str>,
    period_end: i64,
) -> ProviderSubscription {
    ProviderSubscription {
        id: id.to_string(),
        customer: Some(customer.to_string()),
        status: ProviderSubscriptionStatus::from_str(status),
        current_period_end: ts_to_datetime(period_end),
        plan: ProductPlan::from_metadata(plan),
    }
}

pub fn at(ts: i64) -> DateTime<Utc> {
    ts_to_datetime(ts).unwrap()
}

pub fn event_json(event_id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "created": 1_700_000_000,
        "livemode": false,
        "data": { "object": object }
    })
}

pub fn event(event_id: &str, event_type: &str, object: Value) -> StripeEvent {
    serde_json::from_value(event_json(event_id, event_type, object)).unwrap()
}

pub fn checkout_object(user_id: Uuid, customer: &str, subscription_id: &str) -> Value {
    json!({
        "id": "cs_test_1",
        "object": "checkout.session",
        "mode": "subscription",
        "customer": customer,
        "subscription": subscription_id,
        "client_reference_id": user_id.to_string(),
    })
}

pub fn subscription_object(subscription_id: &str, customer: &str) -> Value {
    json!({
        "id": subscription_id,
        "object": "subscription",
        "customer": customer,
        // Payload fields are deliberately stale; only the re-fetched state may be applied.
        "status": "incomplete",
        "metadata": { "plan": "free" },
    })
}

pub fn invoice_object(subscription_id: &str, customer: &str, attempt_count: i64) -> Value {
    json!({
        "id": "in_test_1",
        "object": "invoice",
        "customer": customer,
        "subscription": subscription_id,
        "amount_paid": 990,
        "amount_due": 990,
        "currency": "usd",
        "attempt_count": attempt_count,
    })
}

/// Builds a `Stripe-Signature` header for `payload` signed now.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
