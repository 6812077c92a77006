pub mod reconciliation;

pub use reconciliation::{PaymentEvent, ReconciliationEngine, ReconciliationOutcome, ReconciliationReport};
