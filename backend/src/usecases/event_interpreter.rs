use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use entitlement_core::{
    domain::{
        entities::{audit_logs::InsertAuditLogEntity, entitlements::EntitlementEntity},
        repositories::{
            app_users::AppUserRepository, audit_logs::AuditLogRepository,
            entitlements::EntitlementRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
        },
        value_objects::{
            entitlements::EntitlementPatch,
            enums::{audit_actions::AuditAction, entitlement_statuses::EntitlementStatus},
            provider_subscriptions::ProviderSubscription,
        },
    },
    payments::stripe_client::{
        Expandable, StripeCheckoutSession, StripeEvent, StripeInvoice, StripeSubscriptionRef,
    },
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::stripe_gateway::StripeGateway;

pub const STRIPE_PROVIDER: &str = "stripe";

/// How a delivery ended. Every variant is acknowledged to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    Ignored,
    UnknownSubject,
    AlreadyProcessed,
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("malformed {event_type} object: {source}")]
    MalformedObject {
        event_type: String,
        source: anyhow::Error,
    },
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventKind {
    CheckoutCompleted,
    SubscriptionChanged,
    SubscriptionDeleted,
    PaymentSucceeded,
    PaymentFailed,
    Unrecognized,
}

impl StripeEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => StripeEventKind::CheckoutCompleted,
            "customer.subscription.created" | "customer.subscription.updated" => {
                StripeEventKind::SubscriptionChanged
            }
            "customer.subscription.deleted" => StripeEventKind::SubscriptionDeleted,
            "invoice.payment_succeeded" | "invoice.paid" => StripeEventKind::PaymentSucceeded,
            "invoice.payment_failed" => StripeEventKind::PaymentFailed,
            _ => StripeEventKind::Unrecognized,
        }
    }
}

/// Applies one verified, not-yet-seen event to local state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn apply(&self, event: &StripeEvent) -> Result<WebhookOutcome, InterpretError>;
}

pub struct SubscriptionEventInterpreter<E, C, U, A, Stripe>
where
    E: EntitlementRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    A: AuditLogRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    entitlement_repo: Arc<E>,
    customer_repo: Arc<C>,
    app_user_repo: Arc<U>,
    audit_repo: Arc<A>,
    stripe_client: Arc<Stripe>,
}

impl<E, C, U, A, Stripe> SubscriptionEventInterpreter<E, C, U, A, Stripe>
where
    E: EntitlementRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    A: AuditLogRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    pub fn new(
        entitlement_repo: Arc<E>,
        customer_repo: Arc<C>,
        app_user_repo: Arc<U>,
        audit_repo: Arc<A>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            entitlement_repo,
            customer_repo,
            app_user_repo,
            audit_repo,
            stripe_client,
        }
    }

    async fn handle_checkout_completed(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, InterpretError> {
        let session: StripeCheckoutSession = decode_object(event)?;

        let (Some(customer), Some(subscription)) =
            (session.customer.as_ref(), session.subscription.as_ref())
        else {
            info!(
                event_id = %event.id,
                session_id = ?session.id,
                mode = ?session.mode,
                "event_interpreter: checkout without customer or subscription, nothing to grant"
            );
            return Ok(WebhookOutcome::Ignored);
        };
        let customer_ref = customer.id();
        let subscription_id = subscription.id();

        let Some(user_id) = self.resolve_checkout_user(&session, customer_ref).await? else {
            warn!(
                event_id = %event.id,
                customer_ref,
                "event_interpreter: checkout references an unknown user"
            );
            return Ok(WebhookOutcome::UnknownSubject);
        };

        self.customer_repo
            .upsert_customer_ref(user_id, STRIPE_PROVIDER, customer_ref)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    customer_ref,
                    db_error = ?err,
                    "event_interpreter: failed to record customer mapping"
                );
                err
            })?;

        let subscription = self.fetch_subscription(subscription_id).await?;
        let Some(entitlement) = self
            .write_subscription_state(user_id, &subscription, event)
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        self.audit(
            user_id,
            event,
            AuditAction::SubscriptionCreated,
            entitlement_details(&entitlement),
        )
        .await?;

        Ok(WebhookOutcome::Applied)
    }

    async fn handle_subscription_changed(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, InterpretError> {
        let object: StripeSubscriptionRef = decode_object(event)?;

        let Some(user_id) = self
            .resolve_subject(object.customer.as_ref().map(Expandable::id), Some(object.id.as_str()))
            .await?
        else {
            return Ok(self.unknown_subject(event));
        };

        let subscription = self.fetch_subscription(&object.id).await?;
        let Some(entitlement) = self
            .write_subscription_state(user_id, &subscription, event)
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        self.audit(
            user_id,
            event,
            AuditAction::SubscriptionUpdated,
            entitlement_details(&entitlement),
        )
        .await?;

        Ok(WebhookOutcome::Applied)
    }

    async fn handle_subscription_deleted(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, InterpretError> {
        let object: StripeSubscriptionRef = decode_object(event)?;

        let Some(user_id) = self
            .resolve_subject(object.customer.as_ref().map(Expandable::id), Some(object.id.as_str()))
            .await?
        else {
            return Ok(self.unknown_subject(event));
        };

        let Some(entitlement) = self
            .upsert_if_current(user_id, &object.id, EntitlementPatch::canceled(), event)
            .await?
        else {
            info!(
                %user_id,
                subscription_id = %object.id,
                "event_interpreter: deleted subscription is no longer the user's current one"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        self.audit(
            user_id,
            event,
            AuditAction::SubscriptionDeleted,
            entitlement_details(&entitlement),
        )
        .await?;

        Ok(WebhookOutcome::Applied)
    }

    async fn handle_payment_succeeded(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, InterpretError> {
        let invoice: StripeInvoice = decode_object(event)?;

        let Some(subscription_id) = invoice.subscription_id() else {
            debug!(
                event_id = %event.id,
                invoice_id = ?invoice.id,
                "event_interpreter: invoice is not tied to a subscription"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(user_id) = self
            .resolve_subject(
                invoice.customer.as_ref().map(Expandable::id),
                Some(subscription_id),
            )
            .await?
        else {
            return Ok(self.unknown_subject(event));
        };

        let subscription = self.fetch_subscription(subscription_id).await?;
        let Some(entitlement) = self
            .write_subscription_state(user_id, &subscription, event)
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        let mut details = entitlement_details(&entitlement);
        details["amount"] = json!(invoice.amount_paid);
        details["currency"] = json!(invoice.currency);

        self.audit(user_id, event, AuditAction::PaymentSucceeded, details)
            .await?;

        Ok(WebhookOutcome::Applied)
    }

    async fn handle_payment_failed(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, InterpretError> {
        let invoice: StripeInvoice = decode_object(event)?;

        let Some(subscription_id) = invoice.subscription_id() else {
            debug!(
                event_id = %event.id,
                invoice_id = ?invoice.id,
                "event_interpreter: failed invoice is not tied to a subscription"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(user_id) = self
            .resolve_subject(
                invoice.customer.as_ref().map(Expandable::id),
                Some(subscription_id),
            )
            .await?
        else {
            return Ok(self.unknown_subject(event));
        };

        if self.entitlement_repo.find_by_user_id(user_id).await?.is_none() {
            info!(
                %user_id,
                subscription_id,
                "event_interpreter: payment failed before any entitlement existed"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        // Plan and expiry stay as they are; the expiry itself bounds the grace period.
        let Some(entitlement) = self
            .upsert_if_current(
                user_id,
                subscription_id,
                EntitlementPatch::status_only(EntitlementStatus::PastDue),
                event,
            )
            .await?
        else {
            info!(
                %user_id,
                subscription_id,
                "event_interpreter: failed payment belongs to a superseded subscription"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let mut details = entitlement_details(&entitlement);
        details["attempt_count"] = json!(invoice.attempt_count);
        details["amount_due"] = json!(invoice.amount_due);

        self.audit(user_id, event, AuditAction::PaymentFailed, details)
            .await?;

        Ok(WebhookOutcome::Applied)
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> AnyResult<ProviderSubscription> {
        self.stripe_client
            .retrieve_subscription(subscription_id)
            .await
            .map_err(|err| {
                error!(
                    subscription_id,
                    error = ?err,
                    "event_interpreter: failed to retrieve subscription from stripe"
                );
                err
            })
    }

    /// Writes the re-fetched subscription state unless it would revoke access granted by a
    /// different, newer subscription. Returns `None` when nothing was written.
    async fn write_subscription_state(
        &self,
        user_id: Uuid,
        subscription: &ProviderSubscription,
        event: &StripeEvent,
    ) -> AnyResult<Option<EntitlementEntity>> {
        let patch = EntitlementPatch::from_subscription(subscription);
        if subscription.status.is_active() {
            return self.upsert(user_id, patch, event).await.map(Some);
        }

        let written = self
            .upsert_if_current(user_id, &subscription.id, patch, event)
            .await?;
        if written.is_none() {
            info!(
                %user_id,
                subscription_id = %subscription.id,
                status = ?subscription.status,
                "event_interpreter: inactive subscription is not the user's current one"
            );
        }

        Ok(written)
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        patch: EntitlementPatch,
        event: &StripeEvent,
    ) -> AnyResult<EntitlementEntity> {
        let entitlement = self
            .entitlement_repo
            .upsert_entitlement(user_id, patch)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    event_id = %event.id,
                    db_error = ?err,
                    "event_interpreter: failed to upsert entitlement"
                );
                err
            })?;

        log_entitlement_write(&entitlement, event);
        Ok(entitlement)
    }

    /// Conditional write: skipped when the stored row already belongs to another subscription.
    async fn upsert_if_current(
        &self,
        user_id: Uuid,
        subscription_id: &str,
        patch: EntitlementPatch,
        event: &StripeEvent,
    ) -> AnyResult<Option<EntitlementEntity>> {
        let entitlement = self
            .entitlement_repo
            .upsert_entitlement_if_current(user_id, subscription_id, patch)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id,
                    event_id = %event.id,
                    db_error = ?err,
                    "event_interpreter: failed to upsert entitlement"
                );
                err
            })?;

        if let Some(entitlement) = entitlement.as_ref() {
            log_entitlement_write(entitlement, event);
        }
        Ok(entitlement)
    }

    async fn resolve_checkout_user(
        &self,
        session: &StripeCheckoutSession,
        customer_ref: &str,
    ) -> AnyResult<Option<Uuid>> {
        // A malformed client reference must not hide a usable metadata user id.
        let metadata_user_id = session
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("user_id"))
            .map(String::as_str);
        let explicit = [session.client_reference_id.as_deref(), metadata_user_id]
            .into_iter()
            .flatten()
            .find_map(|raw| Uuid::parse_str(raw).ok());

        match explicit {
            Some(user_id) => self.existing_user(user_id).await,
            None => self.resolve_subject(Some(customer_ref), None).await,
        }
    }

    /// Maps provider references to a local user: customer mapping first, then the entitlement
    /// that last held the subscription.
    async fn resolve_subject(
        &self,
        customer_ref: Option<&str>,
        subscription_id: Option<&str>,
    ) -> AnyResult<Option<Uuid>> {
        if let Some(customer_ref) = customer_ref {
            if let Some(user_id) = self
                .customer_repo
                .find_user_id_by_customer_ref(STRIPE_PROVIDER, customer_ref)
                .await?
            {
                return self.existing_user(user_id).await;
            }
        }

        if let Some(subscription_id) = subscription_id {
            if let Some(entitlement) = self
                .entitlement_repo
                .find_by_subscription_id(subscription_id)
                .await?
            {
                return self.existing_user(entitlement.user_id).await;
            }
        }

        Ok(None)
    }

    async fn existing_user(&self, user_id: Uuid) -> AnyResult<Option<Uuid>> {
        let projection = self.app_user_repo.find_plan_projection(user_id).await?;
        Ok(projection.map(|projection| projection.user_id))
    }

    fn unknown_subject(&self, event: &StripeEvent) -> WebhookOutcome {
        warn!(
            event_id = %event.id,
            event_type = %event.type_,
            "event_interpreter: event does not concern a known user"
        );
        WebhookOutcome::UnknownSubject
    }

    async fn audit(
        &self,
        user_id: Uuid,
        event: &StripeEvent,
        action: AuditAction,
        details: serde_json::Value,
    ) -> AnyResult<()> {
        self.audit_repo
            .record(InsertAuditLogEntity {
                user_id,
                event_id: Some(event.id.clone()),
                action: action.to_string(),
                details,
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    event_id = %event.id,
                    action = %action,
                    db_error = ?err,
                    "event_interpreter: failed to write audit log"
                );
                err
            })
    }
}

#[async_trait]
impl<E, C, U, A, Stripe> EventHandler for SubscriptionEventInterpreter<E, C, U, A, Stripe>
where
    E: EntitlementRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    A: AuditLogRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    async fn apply(&self, event: &StripeEvent) -> Result<WebhookOutcome, InterpretError> {
        match StripeEventKind::from_type(&event.type_) {
            StripeEventKind::CheckoutCompleted => self.handle_checkout_completed(event).await,
            StripeEventKind::SubscriptionChanged => self.handle_subscription_changed(event).await,
            StripeEventKind::SubscriptionDeleted => self.handle_subscription_deleted(event).await,
            StripeEventKind::PaymentSucceeded => self.handle_payment_succeeded(event).await,
            StripeEventKind::PaymentFailed => self.handle_payment_failed(event).await,
            StripeEventKind::Unrecognized => {
                debug!(
                    event_id = %event.id,
                    event_type = %event.type_,
                    "event_interpreter: unhandled stripe event type"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

fn log_entitlement_write(entitlement: &EntitlementEntity, event: &StripeEvent) {
    info!(
        user_id = %entitlement.user_id,
        event_id = %event.id,
        event_type = %event.type_,
        plan = %entitlement.plan,
        plan_expires_at = ?entitlement.plan_expires_at,
        status = %entitlement.status,
        "event_interpreter: entitlement updated"
    );
}

fn decode_object<T: DeserializeOwned>(event: &StripeEvent) -> Result<T, InterpretError> {
    event.object().map_err(|source| {
        warn!(
            event_id = %event.id,
            event_type = %event.type_,
            error = %source,
            "event_interpreter: event object does not match its type"
        );
        InterpretError::MalformedObject {
            event_type: event.type_.clone(),
            source,
        }
    })
}

fn entitlement_details(entitlement: &EntitlementEntity) -> serde_json::Value {
    json!({
        "plan": entitlement.plan,
        "plan_expires_at": entitlement.plan_expires_at,
        "status": entitlement.status,
        "subscription_id": entitlement.external_subscription_id,
    })
}
