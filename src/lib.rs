pub mod adapters;
pub mod config;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod outcome;
pub mod pool;
pub mod roster;
pub mod runner;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{Account, NotificationResult, OrderRecord, OutcomeStatus, ProductSnapshot, ProductTarget};
pub use outcome::OutcomeSink;
pub use runner::CampaignRunner;
pub use session::{ResourceManager, Session, SessionProvider};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
