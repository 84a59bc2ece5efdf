pub mod database;
pub mod documents;
pub mod identity;
pub mod invitations;
pub mod ledger;
pub mod metrics;
pub mod reconciler;
pub mod stripe;
pub mod tenancy;

pub use database::Database;
pub use stripe::StripeClient;
