use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{kind} shares of transaction {transaction_id} sum to {actual:.2}, expected {expected:.2}")]
    SplitMismatch {
        transaction_id: String,
        kind: ShareKind,
        expected: f64,
        actual: f64,
    },

    #[error("Ownership shares of {item_id} sum to {total:.2}%, expected 100%")]
    OwnershipMismatch { item_id: String, total: f64 },

    #[error("{item_id} has both explicit ownership shares and a team id")]
    ConflictingOwnership { item_id: String },

    #[error("Invalid shares on {item_id}: {details}")]
    InvalidShares { item_id: String, details: String },

    #[error("Invalid amount {amount} for {context}: must be a positive finite number")]
    InvalidAmount { context: String, amount: f64 },

    #[error("Insufficient funds in account {account_id}: available {available:.2}, requested {requested:.2}")]
    InsufficientFunds {
        account_id: String,
        available: f64,
        requested: f64,
    },

    #[error("Invalid transfer {transfer_id}: {details}")]
    InvalidTransfer { transfer_id: String, details: String },

    #[error("Transaction {0} already exists")]
    DuplicateTransaction(String),

    #[error("Account {account_id} is not owned by user {user_id} or the transaction's team")]
    AccountNotOwned { account_id: String, user_id: String },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Unknown goal: {0}")]
    UnknownGoal(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Payment,
    Expense,
}

impl std::fmt::Display for ShareKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareKind::Payment => write!(f, "Payment"),
            ShareKind::Expense => write!(f, "Expense"),
        }
    }
}

impl LedgerError {
    /// Rejected input that the initiating user can correct and retry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::SplitMismatch { .. }
                | LedgerError::OwnershipMismatch { .. }
                | LedgerError::ConflictingOwnership { .. }
                | LedgerError::InvalidShares { .. }
                | LedgerError::InvalidAmount { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::AccountNotOwned { .. }
                | LedgerError::InvalidTransfer { .. }
                | LedgerError::DuplicateTransaction(_)
        )
    }

    /// A referenced id did not resolve in the snapshot.
    pub fn is_referential(&self) -> bool {
        matches!(
            self,
            LedgerError::UnknownUser(_)
                | LedgerError::UnknownTeam(_)
                | LedgerError::UnknownAccount(_)
                | LedgerError::UnknownTransaction(_)
                | LedgerError::UnknownAsset(_)
                | LedgerError::UnknownGoal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = LedgerError::InsufficientFunds {
            account_id: "acct-1".to_string(),
            available: 10.0,
            requested: 25.0,
        };
        assert!(err.is_validation());
        assert!(!err.is_referential());
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account acct-1: available 10.00, requested 25.00"
        );

        let err = LedgerError::UnknownAccount("acct-9".to_string());
        assert!(err.is_referential());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_split_mismatch_message() {
        let err = LedgerError::SplitMismatch {
            transaction_id: "tx-1".to_string(),
            kind: ShareKind::Expense,
            expected: 100.0,
            actual: 90.0,
        };
        assert_eq!(
            err.to_string(),
            "Expense shares of transaction tx-1 sum to 90.00, expected 100.00"
        );
    }
}
