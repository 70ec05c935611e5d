mod database;
mod dedup_repo;
mod retry;
mod store;
mod subscription_repo;

pub use database::Database;
pub use dedup_repo::DedupRepository;
pub use store::SubscriptionStore;
pub use subscription_repo::SubscriptionRepository;
