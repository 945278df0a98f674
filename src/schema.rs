use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[schemars(description = "Money received. Payment shares name the accounts credited.")]
    Income,

    #[schemars(description = "Money spent. Payment shares name the accounts debited, expense shares name who bears the cost.")]
    Expense,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentShare {
    pub user_id: String,
    pub account_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseShare {
    pub user_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub description: String,

    #[schemars(description = "Total amount of the transaction, always positive. The type carries the direction.")]
    pub amount: f64,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub category: String,

    #[schemars(description = "Calendar date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    #[serde(default)]
    #[schemars(description = "Marks passive income (dividends, rent, interest). Only meaningful on INCOME.")]
    pub is_passive: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Asset that produced this income, set on dividend postings")]
    pub source_asset_id: Option<String>,

    #[serde(default)]
    #[schemars(description = "Who funded (EXPENSE) or received (INCOME) the money and through which account. Must sum to amount.")]
    pub payment_shares: Vec<PaymentShare>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Who bears the cost of an EXPENSE. Must sum to amount when present. Empty means team equal split or the statement holder.")]
    pub expense_shares: Vec<ExpenseShare>,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    /// An expense whose cost is split explicitly between participants.
    pub fn is_shared_expense(&self) -> bool {
        self.is_expense() && !self.expense_shares.is_empty()
    }

    pub fn payment_total(&self) -> f64 {
        self.payment_shares.iter().map(|s| s.amount).sum()
    }

    pub fn expense_total(&self) -> f64 {
        self.expense_shares.iter().map(|s| s.amount).sum()
    }

    pub fn paid_by(&self, user_id: &str) -> Option<f64> {
        sum_matching(
            self.payment_shares
                .iter()
                .filter(|s| s.user_id == user_id)
                .map(|s| s.amount),
        )
    }

    pub fn owed_by(&self, user_id: &str) -> Option<f64> {
        sum_matching(
            self.expense_shares
                .iter()
                .filter(|s| s.user_id == user_id)
                .map(|s| s.amount),
        )
    }
}

fn sum_matching(amounts: impl Iterator<Item = f64>) -> Option<f64> {
    amounts.fold(None, |acc, amount| Some(acc.unwrap_or(0.0) + amount))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipShare {
    pub user_id: String,
    #[schemars(description = "Percentage owned by this user, 0-100. All shares of an item sum to 100.")]
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockDetails {
    pub ticker: String,
    pub number_of_shares: f64,
    pub purchase_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Explicit ownership split for a personal shared item. Not used together with teamId.")]
    pub shares: Option<Vec<OwnershipShare>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Set on merged team items: the ownership fraction already applied to value")]
    pub merged_fraction: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<StockDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    pub id: String,
    pub name: String,
    pub balance: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<Vec<OwnershipShare>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_fraction: Option<f64>,
}

/// Either side of the balance sheet, borrowed from a statement.
#[derive(Debug, Clone, Copy)]
pub enum BalanceItem<'a> {
    Asset(&'a Asset),
    Liability(&'a Liability),
}

impl<'a> BalanceItem<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            BalanceItem::Asset(a) => &a.id,
            BalanceItem::Liability(l) => &l.id,
        }
    }

    pub fn team_id(&self) -> Option<&'a str> {
        match self {
            BalanceItem::Asset(a) => a.team_id.as_deref(),
            BalanceItem::Liability(l) => l.team_id.as_deref(),
        }
    }

    pub fn shares(&self) -> Option<&'a [OwnershipShare]> {
        match self {
            BalanceItem::Asset(a) => a.shares.as_deref(),
            BalanceItem::Liability(l) => l.shares.as_deref(),
        }
    }

    /// Contribution to net worth before ownership is applied.
    pub fn signed_value(&self) -> f64 {
        match self {
            BalanceItem::Asset(a) => a.value,
            BalanceItem::Liability(l) => -l.balance,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatement {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub liabilities: Vec<Liability>,
}

impl FinancialStatement {
    pub fn balance_items(&self) -> impl Iterator<Item = BalanceItem<'_>> {
        self.assets
            .iter()
            .map(BalanceItem::Asset)
            .chain(self.liabilities.iter().map(BalanceItem::Liability))
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.transaction(id).is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Investment,
    Cash,
    Loan,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub account_type: AccountType,

    #[schemars(description = "Running balance, mutated only by ledger postings")]
    pub balance: f64,

    #[schemars(description = "One owner for a personal account, several for a joint account")]
    pub owner_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl Account {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_ids.iter().any(|id| id == user_id)
    }

    /// Credit lines and loans may be drawn below zero.
    pub fn allows_negative_balance(&self) -> bool {
        matches!(self.account_type, AccountType::Credit | AccountType::Loan)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub category: String,
    #[schemars(description = "Monthly spending limit for the category")]
    pub limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub financial_statement: FinancialStatement,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub achievements: BTreeSet<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            email: None,
            financial_statement: FinancialStatement::default(),
            accounts: Vec::new(),
            team_ids: Vec::new(),
            budgets: Vec::new(),
            goals: Vec::new(),
            achievements: BTreeSet::new(),
        }
    }

    pub fn goal(&self, goal_id: &str) -> Result<&Goal> {
        self.goals
            .iter()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| LedgerError::UnknownGoal(goal_id.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[schemars(description = "Unique member user ids. Order is irrelevant.")]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub financial_statement: FinancialStatement,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>, member_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            member_ids,
            financial_statement: FinancialStatement::default(),
            accounts: Vec::new(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_id)
    }

    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    /// Equal-split fraction for a member, zero for outsiders and empty teams.
    pub fn equal_share(&self, user_id: &str) -> f64 {
        if self.member_ids.is_empty() || !self.is_member(user_id) {
            0.0
        } else {
            1.0 / self.member_count() as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataPoint {
    pub date: NaiveDate,
    pub net_worth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<f64>,
}

/// One consistent read of every user and team the caller fetched together.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl LedgerSnapshot {
    pub fn new(users: Vec<User>, teams: Vec<Team>) -> Self {
        Self { users, teams }
    }

    pub fn user(&self, user_id: &str) -> Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))
    }

    pub fn team(&self, team_id: &str) -> Result<&Team> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .ok_or_else(|| LedgerError::UnknownTeam(team_id.to_string()))
    }

    /// A user present in the snapshot directly or as a member of one of its teams.
    pub fn knows_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.id == user_id) || self.teams.iter().any(|t| t.is_member(user_id))
    }

    /// Teams listing the user as a member.
    pub fn teams_for(&self, user_id: &str) -> Vec<Team> {
        self.teams
            .iter()
            .filter(|t| t.is_member(user_id))
            .cloned()
            .collect()
    }

    pub fn account(&self, account_id: &str) -> Result<&Account> {
        self.users
            .iter()
            .flat_map(|u| u.accounts.iter())
            .chain(self.teams.iter().flat_map(|t| t.accounts.iter()))
            .find(|a| a.id == account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LedgerSnapshot)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
