pub mod app_users;
pub mod audit_logs;
pub mod entitlements;
pub mod payment_provider_customers;
pub mod usage;
pub mod webhook_events;
