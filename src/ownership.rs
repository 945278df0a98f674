//! Resolves how much of an item belongs to one user.
//!
//! Every asset, liability and transaction falls into exactly one
//! [`OwnershipMode`], decided once from which optional fields are present:
//!
//! - explicit `shares` percentages (personal shared items)
//! - a `teamId` (equal split across the team's members)
//! - neither (the holder of the statement owns all of it)
//!
//! A `teamId` that does not resolve to a known team yields a zero fraction
//! rather than an error; orphaned references are expected after membership
//! changes.

use crate::schema::{BalanceItem, OwnershipShare, Team, Transaction};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OwnershipMode<'a> {
    Sole,
    ExplicitShares(&'a [OwnershipShare]),
    TeamEqualSplit(&'a str),
}

impl<'a> OwnershipMode<'a> {
    pub fn of_item(item: BalanceItem<'a>) -> Self {
        if let Some(shares) = item.shares() {
            OwnershipMode::ExplicitShares(shares)
        } else if let Some(team_id) = item.team_id() {
            OwnershipMode::TeamEqualSplit(team_id)
        } else {
            OwnershipMode::Sole
        }
    }

    /// Fraction in `[0, 1]` owned by `user_id`. `holder_id` is the user whose
    /// statement contains the item, used for sole ownership.
    pub fn fraction_for(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64 {
        let fraction = match self {
            OwnershipMode::ExplicitShares(shares) => {
                shares
                    .iter()
                    .find(|s| s.user_id == user_id)
                    .map(|s| s.percentage)
                    .unwrap_or(0.0)
                    / 100.0
            }
            OwnershipMode::TeamEqualSplit(team_id) => team_fraction(team_id, user_id, teams),
            OwnershipMode::Sole => {
                if user_id == holder_id {
                    1.0
                } else {
                    0.0
                }
            }
        };
        fraction.clamp(0.0, 1.0)
    }
}

pub fn resolve_ownership_fraction(
    item: BalanceItem<'_>,
    user_id: &str,
    holder_id: &str,
    teams: &[Team],
) -> f64 {
    OwnershipMode::of_item(item).fraction_for(user_id, holder_id, teams)
}

/// Equal-split fraction of a team for `user_id`; zero for non-members and
/// dangling team ids.
pub fn team_fraction(team_id: &str, user_id: &str, teams: &[Team]) -> f64 {
    match teams.iter().find(|t| t.id == team_id) {
        Some(team) => team.equal_share(user_id),
        None => {
            warn!(
                "Team {} not found while resolving ownership for {}; treating as zero",
                team_id, user_id
            );
            0.0
        }
    }
}

/// Share of a transaction's amount reported for one user.
pub trait TransactionAttribution {
    /// Income the user received: their payment-share entries if any, else
    /// the team equal split, else the full amount for a holder-only record
    /// with no payment shares at all.
    fn attributed_income(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64;

    /// Cost the user bears: their expense-share entries when the expense is
    /// explicitly split, else the team equal split, else the full amount for
    /// the holder.
    fn attributed_expense(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64;

    /// Signed effect on the user's net worth.
    fn attributed_net(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64;
}

impl TransactionAttribution for Transaction {
    fn attributed_income(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64 {
        if let Some(paid) = self.paid_by(user_id) {
            return paid;
        }
        match &self.team_id {
            Some(team_id) => self.amount * team_fraction(team_id, user_id, teams),
            None if self.payment_shares.is_empty() && user_id == holder_id => self.amount,
            None => 0.0,
        }
    }

    fn attributed_expense(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64 {
        if !self.expense_shares.is_empty() {
            return self.owed_by(user_id).unwrap_or(0.0);
        }
        match &self.team_id {
            Some(team_id) => self.amount * team_fraction(team_id, user_id, teams),
            None if user_id == holder_id => self.amount,
            None => 0.0,
        }
    }

    fn attributed_net(&self, user_id: &str, holder_id: &str, teams: &[Team]) -> f64 {
        if self.is_income() {
            self.attributed_income(user_id, holder_id, teams)
        } else {
            -self.attributed_expense(user_id, holder_id, teams)
        }
    }
}
