use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::models::{Account, ProductTarget};
use crate::utils::error::{AppError, Result};

/// One row of the accounts sheet, exported as CSV. Column names match the
/// operators' spreadsheet headers.
#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Card")]
    card: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "URL")]
    url: String,
}

/// Reads the ordered account list. Consumed once at batch start; the core
/// never writes back to it.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<Account>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::Validation(format!(
            "Cannot read accounts file {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut accounts = Vec::new();
    for (line, row) in reader.deserialize::<RosterRow>().enumerate() {
        let row = row?;
        let email = row.email.trim().to_string();
        if email.is_empty() {
            return Err(AppError::Validation(format!(
                "Accounts row {} has an empty Email cell",
                line + 2
            )));
        }
        let targets = ProductTarget::parse_list(&row.url)?;
        accounts.push(Account::new(
            email,
            row.password,
            row.card.trim().to_string(),
            row.address.trim().to_string(),
            targets,
        ));
    }

    info!(count = accounts.len(), path = %path.display(), "Loaded accounts");
    Ok(accounts)
}
