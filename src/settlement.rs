use crate::config::LedgerConfig;
use crate::schema::{Team, Transaction, User};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A user's position against the group: positive means the group owes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetBalance {
    pub user_id: String,
    pub amount: f64,
}

pub struct BalanceNetter<'a> {
    config: &'a LedgerConfig,
    balances: BTreeMap<String, f64>,
    seen: HashSet<String>,
}

impl<'a> BalanceNetter<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self {
            config,
            balances: BTreeMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds every explicitly split expense not seen before. Payers are
    /// credited what they fronted, participants debited what they consumed.
    pub fn record_all<'t>(&mut self, transactions: impl IntoIterator<Item = &'t Transaction>) {
        for tx in transactions {
            if !tx.is_shared_expense() || !self.seen.insert(tx.id.clone()) {
                continue;
            }
            for share in &tx.payment_shares {
                *self.balances.entry(share.user_id.clone()).or_insert(0.0) += share.amount;
            }
            for share in &tx.expense_shares {
                *self.balances.entry(share.user_id.clone()).or_insert(0.0) -= share.amount;
            }
        }
    }

    pub fn finish(self) -> Vec<NetBalance> {
        debug!(
            "Netted {} shared expense(s) across {} participant(s)",
            self.seen.len(),
            self.balances.len()
        );
        let epsilon = self.config.settlement_epsilon;
        self.balances
            .into_iter()
            .filter(|(_, amount)| amount.abs() >= epsilon)
            .map(|(user_id, amount)| NetBalance { user_id, amount })
            .collect()
    }
}

/// Nets every shared expense held in any of the given users' or teams'
/// statements. A transaction stored in several statements counts once.
pub fn compute_net_balances(
    users: &[User],
    teams: &[Team],
    config: &LedgerConfig,
) -> Vec<NetBalance> {
    let mut netter = BalanceNetter::new(config);
    netter.record_all(
        users
            .iter()
            .flat_map(|u| u.financial_statement.transactions.iter()),
    );
    netter.record_all(
        teams
            .iter()
            .flat_map(|t| t.financial_statement.transactions.iter()),
    );
    netter.finish()
}

/// Nets only the shared expenses of one team.
pub fn compute_team_balances(team: &Team, config: &LedgerConfig) -> Vec<NetBalance> {
    let mut netter = BalanceNetter::new(config);
    netter.record_all(team.financial_statement.transactions.iter());
    netter.finish()
}
