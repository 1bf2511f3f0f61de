pub mod account;
pub mod order;
pub mod snapshot;
pub mod target;

pub use account::Account;
pub use order::{NotificationResult, OrderRecord, OutcomeStatus};
pub use snapshot::ProductSnapshot;
pub use target::ProductTarget;
