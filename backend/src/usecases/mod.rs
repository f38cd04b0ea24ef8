pub mod event_interpreter;
pub mod plan_status;
pub mod stripe_gateway;
pub mod webhook_ingress;

#[cfg(test)]
pub(crate) mod test_support;
