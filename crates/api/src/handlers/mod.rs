pub mod sync;
pub mod webhooks;
