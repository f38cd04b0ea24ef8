pub mod audit_actions;
pub mod entitlement_statuses;
pub mod resource_kinds;
pub mod webhook_event_statuses;
