pub mod billing_webhook;
pub mod plan_status;
