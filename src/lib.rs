pub mod billing;
pub mod config;
pub mod currency;
pub mod error;

pub use config::{BillingConfig, WebhookConfig};
pub use error::{BillingError, BillingResult, RepositoryError, RepositoryResult};
