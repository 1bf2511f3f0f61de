use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Authentication failed for account: {account}")]
    Auth { account: String },

    #[error("Target error for {url}: {message}")]
    Target { url: String, message: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl AppError {
    /// Wraps a browser-layer failure, flattening whatever error type the
    /// CDP client surfaced into a message.
    pub fn browser<E: std::fmt::Display>(err: E) -> Self {
        AppError::Browser(err.to_string())
    }

    pub fn target(url: &str, err: impl std::fmt::Display) -> Self {
        AppError::Target {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_auth_error_display() {
        let err = AppError::Auth {
            account: "buyer@example.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed for account: buyer@example.com"
        );
    }

    #[test]
    fn test_target_error_display() {
        let err = AppError::target("https://shop.example.com/p/1", "selector missing");
        assert_eq!(
            err.to_string(),
            "Target error for https://shop.example.com/p/1: selector missing"
        );
    }
}
