//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod pricing_repo;
pub mod sailing_repo;
pub mod sync_lock_repo;
pub mod sync_pass_repo;

pub use pricing_repo::PricingRepo;
pub use sailing_repo::SailingRepo;
pub use sync_lock_repo::SyncLockRepo;
pub use sync_pass_repo::SyncPassRepo;
