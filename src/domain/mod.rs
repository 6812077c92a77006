pub mod audit;
pub mod payment;
pub mod transaction;

pub use audit::AuditLogEntry;
pub use payment::Payment;
pub use transaction::Transaction;
