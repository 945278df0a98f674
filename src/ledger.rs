//! Applies transactions to account balances.
//!
//! Payment shares move cash: INCOME credits each named account, EXPENSE
//! debits it. Expense shares never touch balances; they only decide who is
//! reported as bearing the cost.
//!
//! Every operation works on a private copy of the snapshot's accounts and
//! returns a [`LedgerMutation`] describing the account, statement and goal
//! writes the caller must persist together. Nothing is returned on error, so
//! a failed operation leaves no partial state behind.

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::schema::{
    Account, FinancialStatement, Goal, LedgerSnapshot, PaymentShare, Transaction, TransactionType,
};
use crate::utils::{add_money, round_cents};
use crate::validation::{validate_amount, validate_transaction};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum StatementOwner {
    User(String),
    Team(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StatementChange {
    Upsert {
        owner: StatementOwner,
        transaction: Transaction,
    },
    Remove {
        owner: StatementOwner,
        #[serde(rename = "transactionId")]
        transaction_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalChange {
    pub user_id: String,
    pub goal: Goal,
}

/// Writes produced by one ledger operation, to be persisted atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMutation {
    pub accounts: Vec<Account>,
    pub statements: Vec<StatementChange>,
    pub goals: Vec<GoalChange>,
}

impl LedgerMutation {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.statements.is_empty() && self.goals.is_empty()
    }

    /// Applies the mutation to an in-memory snapshot. Either every write lands
    /// or the snapshot is left as it was.
    pub fn apply_to(&self, snapshot: &mut LedgerSnapshot) -> Result<()> {
        let mut next = snapshot.clone();

        for account in &self.accounts {
            let slot = next
                .users
                .iter_mut()
                .flat_map(|u| u.accounts.iter_mut())
                .chain(next.teams.iter_mut().flat_map(|t| t.accounts.iter_mut()))
                .find(|a| a.id == account.id)
                .ok_or_else(|| LedgerError::UnknownAccount(account.id.clone()))?;
            *slot = account.clone();
        }

        for change in &self.statements {
            match change {
                StatementChange::Upsert { owner, transaction } => {
                    let statement = statement_mut(&mut next, owner)?;
                    match statement
                        .transactions
                        .iter_mut()
                        .find(|t| t.id == transaction.id)
                    {
                        Some(existing) => *existing = transaction.clone(),
                        None => statement.transactions.push(transaction.clone()),
                    }
                }
                StatementChange::Remove {
                    owner,
                    transaction_id,
                } => {
                    statement_mut(&mut next, owner)?
                        .transactions
                        .retain(|t| &t.id != transaction_id);
                }
            }
        }

        for change in &self.goals {
            let user = next
                .users
                .iter_mut()
                .find(|u| u.id == change.user_id)
                .ok_or_else(|| LedgerError::UnknownUser(change.user_id.clone()))?;
            let goal = user
                .goals
                .iter_mut()
                .find(|g| g.id == change.goal.id)
                .ok_or_else(|| LedgerError::UnknownGoal(change.goal.id.clone()))?;
            *goal = change.goal.clone();
        }

        *snapshot = next;
        Ok(())
    }
}

fn statement_mut<'s>(
    snapshot: &'s mut LedgerSnapshot,
    owner: &StatementOwner,
) -> Result<&'s mut FinancialStatement> {
    match owner {
        StatementOwner::User(id) => snapshot
            .users
            .iter_mut()
            .find(|u| &u.id == id)
            .map(|u| &mut u.financial_statement)
            .ok_or_else(|| LedgerError::UnknownUser(id.clone())),
        StatementOwner::Team(id) => snapshot
            .teams
            .iter_mut()
            .find(|t| &t.id == id)
            .map(|t| &mut t.financial_statement)
            .ok_or_else(|| LedgerError::UnknownTeam(id.clone())),
    }
}

/// Working copy of account balances, tracking which accounts changed.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: BTreeMap<String, Account>,
    touched: BTreeSet<String>,
}

impl AccountBook {
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id.clone(), a)).collect(),
            touched: BTreeSet::new(),
        }
    }

    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Self {
        Self::new(
            snapshot
                .users
                .iter()
                .flat_map(|u| u.accounts.iter().cloned())
                .chain(snapshot.teams.iter().flat_map(|t| t.accounts.iter().cloned())),
        )
    }

    pub fn get(&self, account_id: &str) -> Result<&Account> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))
    }

    pub fn balance(&self, account_id: &str) -> Result<f64> {
        Ok(self.get(account_id)?.balance)
    }

    /// Moves the balance by exactly `delta`. The sum is taken in decimal so a
    /// post followed by its reversal restores the original figure.
    pub fn adjust(&mut self, account_id: &str, delta: f64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))?;
        account.balance = add_money(account.balance, delta)?;
        self.touched.insert(account_id.to_string());
        Ok(())
    }

    pub fn post(&mut self, tx: &Transaction) -> Result<()> {
        self.apply(tx, 1.0)
    }

    pub fn reverse(&mut self, tx: &Transaction) -> Result<()> {
        self.apply(tx, -1.0)
    }

    fn apply(&mut self, tx: &Transaction, direction: f64) -> Result<()> {
        // resolve everything first: an unknown account must not leave a half-posted book
        for share in &tx.payment_shares {
            self.get(&share.account_id)?;
        }

        let sign = match tx.transaction_type {
            TransactionType::Income => 1.0,
            TransactionType::Expense => -1.0,
        };

        for share in &tx.payment_shares {
            self.adjust(&share.account_id, sign * direction * share.amount)?;
        }
        Ok(())
    }

    /// Accounts whose balance was adjusted, ordered by id.
    pub fn changed(&self) -> Vec<Account> {
        self.touched
            .iter()
            .filter_map(|id| self.accounts.get(id).cloned())
            .collect()
    }
}

/// Posts `tx` against `accounts`, returning the accounts in input order with
/// updated balances.
pub fn post_transaction(tx: &Transaction, accounts: &[Account]) -> Result<Vec<Account>> {
    let mut book = AccountBook::new(accounts.iter().cloned());
    book.post(tx)?;
    accounts
        .iter()
        .map(|a| book.get(&a.id).cloned())
        .collect()
}

/// Undoes a previous [`post_transaction`] of the same transaction.
pub fn reverse_transaction(tx: &Transaction, accounts: &[Account]) -> Result<Vec<Account>> {
    let mut book = AccountBook::new(accounts.iter().cloned());
    book.reverse(tx)?;
    accounts
        .iter()
        .map(|a| book.get(&a.id).cloned())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    /// Moves money and records a matching OUT/IN transaction pair.
    Standard,
    /// Moves money silently, possibly into another member's account.
    SettleUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub id: String,
    pub user_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub kind: TransferKind,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendRequest {
    pub id: String,
    pub user_id: String,
    pub asset_id: String,
    pub account_id: String,
    pub amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalContribution {
    pub user_id: String,
    pub goal_id: String,
    pub account_id: String,
    pub amount: f64,
}

/// Outcome of a generated life event: a signed amount landing on one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub date: NaiveDate,
}

pub struct LedgerPoster<'a> {
    snapshot: &'a LedgerSnapshot,
    config: &'a LedgerConfig,
}

impl<'a> LedgerPoster<'a> {
    pub fn new(snapshot: &'a LedgerSnapshot, config: &'a LedgerConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn add_transaction(&self, actor_id: &str, tx: Transaction) -> Result<LedgerMutation> {
        validate_transaction(&tx, self.config)?;
        self.snapshot.user(actor_id)?;
        self.ensure_new_id(&tx.id)?;

        let owner = self.owner_for(actor_id, tx.team_id.as_deref())?;
        let mut book = AccountBook::from_snapshot(self.snapshot);
        self.check_references(&book, &tx)?;
        book.post(&tx)?;

        info!(
            "Posted {:?} transaction {} of {:.2} to {:?}",
            tx.transaction_type, tx.id, tx.amount, owner
        );

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements: vec![StatementChange::Upsert {
                owner,
                transaction: tx,
            }],
            goals: Vec::new(),
        })
    }

    /// Replaces a stored transaction: the old posting is always reversed
    /// before the new one is applied.
    pub fn update_transaction(&self, actor_id: &str, tx: Transaction) -> Result<LedgerMutation> {
        validate_transaction(&tx, self.config)?;
        self.snapshot.user(actor_id)?;

        let existing = self.locate(&tx.id);
        let (_, previous) = existing
            .first()
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.id.clone()))?;

        let owner = match tx.team_id.as_deref() {
            Some(team_id) => StatementOwner::Team(self.snapshot.team(team_id)?.id.clone()),
            None => existing
                .iter()
                .map(|(owner, _)| owner)
                .find(|owner| matches!(owner, StatementOwner::User(_)))
                .cloned()
                .unwrap_or_else(|| StatementOwner::User(actor_id.to_string())),
        };

        let mut book = AccountBook::from_snapshot(self.snapshot);
        book.reverse(previous)?;
        self.check_references(&book, &tx)?;
        book.post(&tx)?;

        let mut statements: Vec<StatementChange> = existing
            .iter()
            .filter(|(o, _)| *o != owner)
            .map(|(o, _)| StatementChange::Remove {
                owner: o.clone(),
                transaction_id: tx.id.clone(),
            })
            .collect();

        info!(
            "Updated transaction {}: {:.2} -> {:.2}",
            tx.id, previous.amount, tx.amount
        );

        statements.push(StatementChange::Upsert {
            owner,
            transaction: tx,
        });

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements,
            goals: Vec::new(),
        })
    }

    /// Reverses the transaction once and removes it from every statement
    /// holding a copy.
    pub fn delete_transaction(&self, transaction_id: &str) -> Result<LedgerMutation> {
        let existing = self.locate(transaction_id);
        let (_, stored) = existing
            .first()
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;

        let mut book = AccountBook::from_snapshot(self.snapshot);
        book.reverse(stored)?;

        info!(
            "Deleted transaction {} from {} statement(s)",
            transaction_id,
            existing.len()
        );

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements: existing
                .iter()
                .map(|(owner, _)| StatementChange::Remove {
                    owner: owner.clone(),
                    transaction_id: transaction_id.to_string(),
                })
                .collect(),
            goals: Vec::new(),
        })
    }

    pub fn transfer(&self, request: &TransferRequest) -> Result<LedgerMutation> {
        validate_amount(&format!("transfer {}", request.id), request.amount)?;
        self.snapshot.user(&request.user_id)?;

        if request.from_account_id == request.to_account_id {
            return Err(LedgerError::InvalidTransfer {
                transfer_id: request.id.clone(),
                details: "source and destination are the same account".to_string(),
            });
        }

        let mut book = AccountBook::from_snapshot(self.snapshot);
        let from = book.get(&request.from_account_id)?.clone();
        let to = book.get(&request.to_account_id)?.clone();

        if !self.can_operate(&from, &request.user_id) {
            return Err(LedgerError::AccountNotOwned {
                account_id: from.id.clone(),
                user_id: request.user_id.clone(),
            });
        }
        if request.kind == TransferKind::Standard && !self.can_operate(&to, &request.user_id) {
            return Err(LedgerError::AccountNotOwned {
                account_id: to.id.clone(),
                user_id: request.user_id.clone(),
            });
        }
        ensure_funds(&from, request.amount)?;

        let statements = match request.kind {
            TransferKind::SettleUp => {
                book.adjust(&from.id, -request.amount)?;
                book.adjust(&to.id, request.amount)?;
                Vec::new()
            }
            TransferKind::Standard => {
                let (outgoing, incoming) = self.transfer_pair(request, &from, &to);
                self.ensure_new_id(&outgoing.id)?;
                self.ensure_new_id(&incoming.id)?;
                book.post(&outgoing)?;
                book.post(&incoming)?;

                let owner = StatementOwner::User(request.user_id.clone());
                vec![
                    StatementChange::Upsert {
                        owner: owner.clone(),
                        transaction: outgoing,
                    },
                    StatementChange::Upsert {
                        owner,
                        transaction: incoming,
                    },
                ]
            }
        };

        info!(
            "{:?} transfer {} of {:.2} from {} to {}",
            request.kind, request.id, request.amount, from.id, to.id
        );

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements,
            goals: Vec::new(),
        })
    }

    fn transfer_pair(
        &self,
        request: &TransferRequest,
        from: &Account,
        to: &Account,
    ) -> (Transaction, Transaction) {
        let leg = |suffix: &str,
                   transaction_type: TransactionType,
                   account: &Account,
                   default_description: String| Transaction {
            id: format!("{}-{}", request.id, suffix),
            description: request
                .description
                .clone()
                .unwrap_or(default_description),
            amount: request.amount,
            transaction_type,
            category: self.config.transfer_category.clone(),
            date: request.date,
            is_passive: false,
            team_id: None,
            receipt_url: None,
            source_asset_id: None,
            payment_shares: vec![PaymentShare {
                user_id: request.user_id.clone(),
                account_id: account.id.clone(),
                amount: request.amount,
            }],
            expense_shares: Vec::new(),
        };

        (
            leg(
                "out",
                TransactionType::Expense,
                from,
                format!("Transfer to {}", to.name),
            ),
            leg(
                "in",
                TransactionType::Income,
                to,
                format!("Transfer from {}", from.name),
            ),
        )
    }

    /// Credits the account and records passive income tagged with the asset.
    pub fn post_dividend(&self, request: &DividendRequest) -> Result<LedgerMutation> {
        validate_amount(&format!("dividend {}", request.id), request.amount)?;
        let user = self.snapshot.user(&request.user_id)?;
        self.ensure_new_id(&request.id)?;

        let (owner, asset) = match user.financial_statement.asset(&request.asset_id) {
            Some(asset) => (StatementOwner::User(user.id.clone()), asset),
            None => self
                .snapshot
                .teams
                .iter()
                .filter(|t| t.is_member(&user.id))
                .find_map(|t| {
                    t.financial_statement
                        .asset(&request.asset_id)
                        .map(|a| (StatementOwner::Team(t.id.clone()), a))
                })
                .ok_or_else(|| LedgerError::UnknownAsset(request.asset_id.clone()))?,
        };

        let mut book = AccountBook::from_snapshot(self.snapshot);
        let account = book.get(&request.account_id)?;
        if !self.can_operate(account, &user.id) {
            return Err(LedgerError::AccountNotOwned {
                account_id: account.id.clone(),
                user_id: user.id.clone(),
            });
        }

        let label = asset
            .stock
            .as_ref()
            .map(|s| s.ticker.clone())
            .unwrap_or_else(|| asset.name.clone());
        let team_id = match &owner {
            StatementOwner::Team(id) => Some(id.clone()),
            StatementOwner::User(_) => None,
        };

        let tx = Transaction {
            id: request.id.clone(),
            description: format!("Dividend from {}", label),
            amount: request.amount,
            transaction_type: TransactionType::Income,
            category: self.config.dividend_category.clone(),
            date: request.date,
            is_passive: true,
            team_id,
            receipt_url: None,
            source_asset_id: Some(asset.id.clone()),
            payment_shares: vec![PaymentShare {
                user_id: user.id.clone(),
                account_id: request.account_id.clone(),
                amount: request.amount,
            }],
            expense_shares: Vec::new(),
        };
        book.post(&tx)?;

        info!(
            "Posted dividend {} of {:.2} from {} into {}",
            tx.id, tx.amount, label, request.account_id
        );

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements: vec![StatementChange::Upsert {
                owner,
                transaction: tx,
            }],
            goals: Vec::new(),
        })
    }

    pub fn contribute_to_goal(&self, request: &GoalContribution) -> Result<LedgerMutation> {
        validate_amount(
            &format!("contribution to goal {}", request.goal_id),
            request.amount,
        )?;
        let user = self.snapshot.user(&request.user_id)?;
        let mut goal = user.goal(&request.goal_id)?.clone();

        let mut book = AccountBook::from_snapshot(self.snapshot);
        let account = book.get(&request.account_id)?;
        if !self.can_operate(account, &user.id) {
            return Err(LedgerError::AccountNotOwned {
                account_id: account.id.clone(),
                user_id: user.id.clone(),
            });
        }
        ensure_funds(account, request.amount)?;

        book.adjust(&request.account_id, -request.amount)?;
        goal.current_amount = add_money(goal.current_amount, request.amount)?;

        info!(
            "Contributed {:.2} from {} to goal {} ({:.2}/{:.2})",
            request.amount, request.account_id, goal.id, goal.current_amount, goal.target_amount
        );

        Ok(LedgerMutation {
            accounts: book.changed(),
            statements: Vec::new(),
            goals: vec![GoalChange {
                user_id: user.id.clone(),
                goal,
            }],
        })
    }

    /// Records an event outcome as income (positive) or expense (negative).
    /// Events may overdraw the account.
    pub fn apply_event_outcome(&self, outcome: &EventOutcome) -> Result<LedgerMutation> {
        if !outcome.amount.is_finite() || outcome.amount == 0.0 {
            return Err(LedgerError::InvalidAmount {
                context: format!("event {}", outcome.id),
                amount: outcome.amount,
            });
        }

        let transaction_type = if outcome.amount > 0.0 {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };
        let amount = outcome.amount.abs();

        let tx = Transaction {
            id: outcome.id.clone(),
            description: outcome.description.clone(),
            amount,
            transaction_type,
            category: outcome.category.clone(),
            date: outcome.date,
            is_passive: false,
            team_id: None,
            receipt_url: None,
            source_asset_id: None,
            payment_shares: vec![PaymentShare {
                user_id: outcome.user_id.clone(),
                account_id: outcome.account_id.clone(),
                amount,
            }],
            expense_shares: Vec::new(),
        };

        self.add_transaction(&outcome.user_id, tx)
    }

    /// Every statement holding a copy of the transaction, users first.
    fn locate(&self, transaction_id: &str) -> Vec<(StatementOwner, &'a Transaction)> {
        let users = self.snapshot.users.iter().filter_map(|u| {
            u.financial_statement
                .transaction(transaction_id)
                .map(|t| (StatementOwner::User(u.id.clone()), t))
        });
        let teams = self.snapshot.teams.iter().filter_map(|t| {
            t.financial_statement
                .transaction(transaction_id)
                .map(|tx| (StatementOwner::Team(t.id.clone()), tx))
        });
        users.chain(teams).collect()
    }

    fn ensure_new_id(&self, transaction_id: &str) -> Result<()> {
        if self.locate(transaction_id).is_empty() {
            Ok(())
        } else {
            Err(LedgerError::DuplicateTransaction(transaction_id.to_string()))
        }
    }

    fn owner_for(&self, actor_id: &str, team_id: Option<&str>) -> Result<StatementOwner> {
        match team_id {
            Some(team_id) => Ok(StatementOwner::Team(self.snapshot.team(team_id)?.id.clone())),
            None => Ok(StatementOwner::User(actor_id.to_string())),
        }
    }

    fn can_operate(&self, account: &Account, user_id: &str) -> bool {
        account.is_owned_by(user_id)
            || account
                .team_id
                .as_deref()
                .and_then(|team_id| self.snapshot.team(team_id).ok())
                .is_some_and(|team| team.is_member(user_id))
    }

    fn check_references(&self, book: &AccountBook, tx: &Transaction) -> Result<()> {
        for share in &tx.payment_shares {
            if !self.snapshot.knows_user(&share.user_id) {
                return Err(LedgerError::UnknownUser(share.user_id.clone()));
            }
            let account = book.get(&share.account_id)?;
            let team_account =
                tx.team_id.is_some() && account.team_id.as_deref() == tx.team_id.as_deref();
            if !account.is_owned_by(&share.user_id) && !team_account {
                return Err(LedgerError::AccountNotOwned {
                    account_id: account.id.clone(),
                    user_id: share.user_id.clone(),
                });
            }
        }

        for share in &tx.expense_shares {
            if !self.snapshot.knows_user(&share.user_id) {
                return Err(LedgerError::UnknownUser(share.user_id.clone()));
            }
        }

        debug!(
            "Transaction {} references {} payment and {} expense share(s)",
            tx.id,
            tx.payment_shares.len(),
            tx.expense_shares.len()
        );
        Ok(())
    }
}

fn ensure_funds(account: &Account, amount: f64) -> Result<()> {
    if !account.allows_negative_balance() && round_cents(account.balance - amount) < 0.0 {
        return Err(LedgerError::InsufficientFunds {
            account_id: account.id.clone(),
            available: account.balance,
            requested: amount,
        });
    }
    Ok(())
}
