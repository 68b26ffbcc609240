// Engagement: like toggling and the denormalized counters it maintains.

pub mod reconcile;
pub mod toggle;

pub use reconcile::{reconcile_counters, reconcile_subject, ReconcileReport};
pub use toggle::{CounterRead, EngagementService, ToggleOutcome};
