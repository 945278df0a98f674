//! # Cashflow Ledger
//!
//! The balance engine behind a shared personal-finance ledger: users and
//! teams keep their own statements and accounts, and this crate turns one
//! consistent snapshot of them into per-user numbers.
//!
//! ## Core Concepts
//!
//! - **Payment shares**: who funded or received a transaction, and from which
//!   account. These are the only thing that moves account balances.
//! - **Expense shares**: who bears the cost of an expense. These drive
//!   personal spend and group settlement, never balances.
//! - **Effective statement**: a user's personal statement merged with every
//!   team statement they belong to, team assets scaled to the user's share.
//! - **Ownership fraction**: explicit percentages, team equal split, or sole
//!   ownership by the statement holder.
//!
//! All computation is pure and synchronous. Mutating operations return a
//! [`LedgerMutation`] that the caller persists as a single write, then
//! refetches users and teams together before computing again.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cashflow_ledger::*;
//!
//! let snapshot = LedgerSnapshot::from_json_str(&fetched_json)?;
//! let engine = LedgerEngine::new(&snapshot, LedgerConfig::default())?;
//!
//! let metrics = engine.metrics("alice", &PeriodFilter::month(2024, 3))?;
//! println!("net worth {:.2}, cash flow {:.2}", metrics.net_worth, metrics.cash_flow);
//!
//! let mutation = engine.poster().add_transaction("alice", transaction)?;
//! store.write_atomically(&mutation)?;
//! ```

pub mod budgets;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod merger;
pub mod metrics;
pub mod ownership;
pub mod schema;
pub mod settlement;
pub mod utils;
pub mod validation;

pub use budgets::{budget_progress, goal_progress, BudgetProgress, GoalProgress};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result, ShareKind};
pub use history::{build_net_worth_history, HistoryBuilder};
pub use ledger::{
    post_transaction, reverse_transaction, AccountBook, DividendRequest, EventOutcome,
    GoalChange, GoalContribution, LedgerMutation, LedgerPoster, StatementChange, StatementOwner,
    TransferKind, TransferRequest,
};
pub use merger::{merge_effective_statement, StatementMerger};
pub use metrics::{
    compute_metrics, compute_team_metrics, AttributionView, FinancialMetrics, MetricsAggregator,
    PeriodFilter,
};
pub use ownership::{resolve_ownership_fraction, OwnershipMode, TransactionAttribution};
pub use schema::*;
pub use settlement::{compute_net_balances, compute_team_balances, BalanceNetter, NetBalance};
pub use utils::*;
pub use validation::{validate_snapshot, validate_statement, validate_transaction};

use log::{debug, info};

/// Read-side entry point over one snapshot.
pub struct LedgerEngine<'a> {
    snapshot: &'a LedgerSnapshot,
    config: LedgerConfig,
}

impl<'a> LedgerEngine<'a> {
    pub fn new(snapshot: &'a LedgerSnapshot, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Ledger snapshot holds {} user(s) and {} team(s)",
            snapshot.users.len(),
            snapshot.teams.len()
        );
        Ok(Self { snapshot, config })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Full integrity check of the stored statements.
    pub fn verify_snapshot(&self) -> Result<()> {
        validate_snapshot(self.snapshot, &self.config)
    }

    pub fn effective_statement(&self, user_id: &str) -> Result<FinancialStatement> {
        let user = self.snapshot.user(user_id)?;
        Ok(merge_effective_statement(user, &self.snapshot.teams))
    }

    pub fn metrics(&self, user_id: &str, period: &PeriodFilter) -> Result<FinancialMetrics> {
        let user = self.snapshot.user(user_id)?;
        let teams = self.snapshot.teams_for(user_id);
        let statement = merge_effective_statement(user, &teams);
        let metrics = compute_metrics(&statement, user, &teams, period);
        info!(
            "Computed metrics for {}: net worth {:.2}, cash flow {:.2}",
            user_id, metrics.net_worth, metrics.cash_flow
        );
        Ok(metrics)
    }

    pub fn team_metrics(&self, team_id: &str, period: &PeriodFilter) -> Result<FinancialMetrics> {
        Ok(compute_team_metrics(self.snapshot.team(team_id)?, period))
    }

    pub fn history(&self, user_id: &str) -> Result<Vec<HistoricalDataPoint>> {
        let user = self.snapshot.user(user_id)?;
        let teams = self.snapshot.teams_for(user_id);
        Ok(build_net_worth_history(user, &teams))
    }

    /// Settlement positions across the user's personal and team statements.
    pub fn net_balances(&self, user_id: &str) -> Result<Vec<NetBalance>> {
        let user = self.snapshot.user(user_id)?;
        let teams = self.snapshot.teams_for(user_id);
        Ok(compute_net_balances(
            std::slice::from_ref(user),
            &teams,
            &self.config,
        ))
    }

    pub fn team_balances(&self, team_id: &str) -> Result<Vec<NetBalance>> {
        Ok(compute_team_balances(
            self.snapshot.team(team_id)?,
            &self.config,
        ))
    }

    pub fn budget_progress(
        &self,
        user_id: &str,
        period: &PeriodFilter,
    ) -> Result<Vec<BudgetProgress>> {
        let user = self.snapshot.user(user_id)?;
        let metrics = self.metrics(user_id, period)?;
        Ok(budget_progress(&user.budgets, &metrics))
    }

    pub fn poster(&self) -> LedgerPoster<'_> {
        LedgerPoster::new(self.snapshot, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot() -> LedgerSnapshot {
        let mut alice = User::new("alice", "Alice");
        alice.accounts.push(Account {
            id: "a-chk".to_string(),
            name: "Checking".to_string(),
            account_type: AccountType::Checking,
            balance: 1000.0,
            owner_ids: vec!["alice".to_string()],
            team_id: None,
        });
        alice.budgets.push(Budget {
            id: "food".to_string(),
            category: "Food".to_string(),
            limit: 200.0,
        });
        let bob = User::new("bob", "Bob");
        let team = Team::new(
            "team-1",
            "Flat",
            vec!["alice".to_string(), "bob".to_string()],
        );
        LedgerSnapshot::new(vec![alice, bob], vec![team])
    }

    fn groceries() -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            description: "Groceries".to_string(),
            amount: 120.0,
            transaction_type: TransactionType::Expense,
            category: "Food".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            is_passive: false,
            team_id: Some("team-1".to_string()),
            receipt_url: None,
            source_asset_id: None,
            payment_shares: vec![PaymentShare {
                user_id: "alice".to_string(),
                account_id: "a-chk".to_string(),
                amount: 120.0,
            }],
            expense_shares: vec![
                ExpenseShare {
                    user_id: "alice".to_string(),
                    amount: 60.0,
                },
                ExpenseShare {
                    user_id: "bob".to_string(),
                    amount: 60.0,
                },
            ],
        }
    }

    #[test]
    fn test_engine_end_to_end() {
        let mut snap = snapshot();
        let mutation = LedgerEngine::new(&snap, LedgerConfig::default())
            .unwrap()
            .poster()
            .add_transaction("alice", groceries())
            .unwrap();
        mutation.apply_to(&mut snap).unwrap();

        let engine = LedgerEngine::new(&snap, LedgerConfig::default()).unwrap();
        assert!(engine.verify_snapshot().is_ok());

        let march = PeriodFilter::month(2024, 3);
        let alice = engine.metrics("alice", &march).unwrap();
        assert_eq!(alice.total_expenses, 60.0);
        let bob = engine.metrics("bob", &march).unwrap();
        assert_eq!(bob.total_expenses, 60.0);

        let team = engine.team_metrics("team-1", &march).unwrap();
        assert_eq!(team.total_expenses, 120.0);

        let balances = engine.net_balances("alice").unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(engine.team_balances("team-1").unwrap(), balances);

        let budgets = engine.budget_progress("alice", &march).unwrap();
        assert_eq!(budgets[0].spent, 60.0);
        assert!(!budgets[0].over_budget);

        let history = engine.history("bob").unwrap();
        assert_eq!(history.last().unwrap().net_worth, -60.0);
    }

    #[test]
    fn test_engine_unknown_user() {
        let snap = snapshot();
        let engine = LedgerEngine::new(&snap, LedgerConfig::default()).unwrap();
        let err = engine.metrics("carol", &PeriodFilter::All).unwrap_err();
        assert!(err.is_referential());
    }

    #[test]
    fn test_engine_rejects_bad_config() {
        let snap = snapshot();
        let config = LedgerConfig {
            split_tolerance: f64::NAN,
            ..LedgerConfig::default()
        };
        assert!(LedgerEngine::new(&snap, config).is_err());
    }
}
