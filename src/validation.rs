use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result, ShareKind};
use crate::schema::{BalanceItem, FinancialStatement, LedgerSnapshot, Team, Transaction};
use crate::utils::approx_eq;
use std::collections::HashSet;

pub fn validate_amount(context: &str, amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::InvalidAmount {
            context: context.to_string(),
            amount,
        });
    }
    Ok(())
}

/// Checks the split-sum invariants of a transaction before it is posted.
pub fn validate_transaction(tx: &Transaction, config: &LedgerConfig) -> Result<()> {
    validate_amount(&format!("transaction {}", tx.id), tx.amount)?;

    if tx.payment_shares.is_empty() {
        return Err(LedgerError::InvalidShares {
            item_id: tx.id.clone(),
            details: "at least one payment share is required".to_string(),
        });
    }

    for share in &tx.payment_shares {
        if !share.amount.is_finite() || share.amount < 0.0 {
            return Err(LedgerError::InvalidShares {
                item_id: tx.id.clone(),
                details: format!(
                    "payment share of {} has invalid amount {}",
                    share.user_id, share.amount
                ),
            });
        }
    }

    let paid = tx.payment_total();
    if !approx_eq(paid, tx.amount, config.split_tolerance) {
        return Err(LedgerError::SplitMismatch {
            transaction_id: tx.id.clone(),
            kind: ShareKind::Payment,
            expected: tx.amount,
            actual: paid,
        });
    }

    if !tx.expense_shares.is_empty() {
        if tx.is_income() {
            return Err(LedgerError::InvalidShares {
                item_id: tx.id.clone(),
                details: "expense shares are only allowed on EXPENSE transactions".to_string(),
            });
        }

        for share in &tx.expense_shares {
            if !share.amount.is_finite() || share.amount < 0.0 {
                return Err(LedgerError::InvalidShares {
                    item_id: tx.id.clone(),
                    details: format!(
                        "expense share of {} has invalid amount {}",
                        share.user_id, share.amount
                    ),
                });
            }
        }

        let owed = tx.expense_total();
        if !approx_eq(owed, tx.amount, config.split_tolerance) {
            return Err(LedgerError::SplitMismatch {
                transaction_id: tx.id.clone(),
                kind: ShareKind::Expense,
                expected: tx.amount,
                actual: owed,
            });
        }
    }

    if tx.is_passive && tx.is_expense() {
        return Err(LedgerError::InvalidShares {
            item_id: tx.id.clone(),
            details: "only INCOME transactions can be passive".to_string(),
        });
    }

    Ok(())
}

/// Explicit ownership percentages must sum to 100 and cannot be combined
/// with team ownership.
pub fn validate_ownership(item: BalanceItem<'_>, config: &LedgerConfig) -> Result<()> {
    let Some(shares) = item.shares() else {
        return Ok(());
    };

    if item.team_id().is_some() {
        return Err(LedgerError::ConflictingOwnership {
            item_id: item.id().to_string(),
        });
    }

    let mut seen = HashSet::new();
    for share in shares {
        if !share.percentage.is_finite() || share.percentage < 0.0 || share.percentage > 100.0 {
            return Err(LedgerError::InvalidShares {
                item_id: item.id().to_string(),
                details: format!(
                    "percentage {} for {} is outside 0-100",
                    share.percentage, share.user_id
                ),
            });
        }
        if !seen.insert(share.user_id.as_str()) {
            return Err(LedgerError::InvalidShares {
                item_id: item.id().to_string(),
                details: format!("user {} listed more than once", share.user_id),
            });
        }
    }

    let total: f64 = shares.iter().map(|s| s.percentage).sum();
    if !approx_eq(total, 100.0, config.ownership_tolerance) {
        return Err(LedgerError::OwnershipMismatch {
            item_id: item.id().to_string(),
            total,
        });
    }

    Ok(())
}

pub fn validate_team(team: &Team) -> Result<()> {
    let mut seen = HashSet::new();
    for member in &team.member_ids {
        if !seen.insert(member.as_str()) {
            return Err(LedgerError::InvalidShares {
                item_id: team.id.clone(),
                details: format!("member {} listed more than once", member),
            });
        }
    }
    Ok(())
}

/// Runs every item-level check over a stored (unmerged) statement.
pub fn validate_statement(statement: &FinancialStatement, config: &LedgerConfig) -> Result<()> {
    for tx in &statement.transactions {
        validate_transaction(tx, config)?;
    }
    for item in statement.balance_items() {
        validate_ownership(item, config)?;
    }
    Ok(())
}

/// Validates every stored statement and team, and that every account a
/// transaction pays through exists.
pub fn validate_snapshot(snapshot: &LedgerSnapshot, config: &LedgerConfig) -> Result<()> {
    config.validate()?;

    let statements = snapshot
        .users
        .iter()
        .map(|u| &u.financial_statement)
        .chain(snapshot.teams.iter().map(|t| &t.financial_statement));

    for statement in statements {
        validate_statement(statement, config)?;
        for tx in &statement.transactions {
            for share in &tx.payment_shares {
                snapshot.account(&share.account_id)?;
            }
        }
    }

    for team in &snapshot.teams {
        validate_team(team)?;
    }
    Ok(())
}
