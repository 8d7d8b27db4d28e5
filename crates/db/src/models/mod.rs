//! Row models, one module per table group.

pub mod pricing;
pub mod sailing;
pub mod sync_lock;
pub mod sync_pass;
