pub mod adapters;
pub mod manager;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod postgres;
pub mod recurrence;
pub mod repository;
pub mod scheduler;

pub use adapters::{ApprovingGateway, ChargeOutcome, PaymentGateway};
pub use manager::{BillingManager, ManagerSettings};
pub use memory::InMemoryBillingStore;
pub use models::{
    BatchPhase, BatchResult, DueSubscription, PlanCost, PlanTag, RecurrenceUnit,
    SubscriptionFailure, SubscriptionPlan, SubscriptionState, SubscriptionTransaction,
    UserSubscription,
};
pub use notifications::{
    LifecycleEvent, LogNotifier, NotificationService, WebhookNotifier, SIGNATURE_HEADER,
};
pub use postgres::PgBillingStore;
pub use recurrence::RecurrenceCalculator;
pub use repository::{GroupMembership, MembershipChange, SubscriptionRepository};
pub use scheduler::{process_tick as run_billing_tick, spawn as spawn_billing_scheduler};
