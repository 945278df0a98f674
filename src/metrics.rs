use crate::error::Result;
use crate::ownership::{resolve_ownership_fraction, TransactionAttribution};
use crate::schema::{BalanceItem, FinancialStatement, Team, Transaction, User};
use crate::utils::{iso_date, month_key, parse_period_string};
use chrono::{Local, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selects the transactions a metric run looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PeriodFilter {
    All,
    /// Matches ISO dates starting with the prefix: "2024" or "2024-03".
    Prefix { prefix: String },
    Range { start: NaiveDate, end: NaiveDate },
}

impl PeriodFilter {
    pub fn month(year: i32, month: u32) -> Self {
        PeriodFilter::Prefix {
            prefix: format!("{:04}-{:02}", year, month),
        }
    }

    pub fn year(year: i32) -> Self {
        PeriodFilter::Prefix {
            prefix: format!("{:04}", year),
        }
    }

    pub fn containing(date: NaiveDate) -> Self {
        PeriodFilter::Prefix {
            prefix: month_key(date),
        }
    }

    pub fn current_month() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// Accepts "all", "YYYY", "YYYY-MM" or "YYYY-MM:YYYY-MM".
    pub fn parse(period: &str) -> Result<Self> {
        let period = period.trim();
        if period.eq_ignore_ascii_case("all") {
            return Ok(PeriodFilter::All);
        }
        if period.len() == 4 && period.chars().all(|c| c.is_ascii_digit()) {
            return Ok(PeriodFilter::Prefix {
                prefix: period.to_string(),
            });
        }
        let (start, end) = parse_period_string(period)?;
        if period.contains(':') {
            Ok(PeriodFilter::Range { start, end })
        } else {
            Ok(Self::containing(start))
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            PeriodFilter::All => true,
            PeriodFilter::Prefix { prefix } => iso_date(date).starts_with(prefix.as_str()),
            PeriodFilter::Range { start, end } => *start <= date && date <= *end,
        }
    }
}

impl Default for PeriodFilter {
    fn default() -> Self {
        Self::current_month()
    }
}

/// Whose share of the statement is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionView<'a> {
    /// One user's portion, resolved through shares and team splits.
    Member { user_id: &'a str },
    /// A team reporting on itself: every item counts in full.
    WholeStatement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub net_worth: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub total_income: f64,
    pub passive_income: f64,
    pub total_expenses: f64,
    pub cash_flow: f64,
    pub category_breakdown: BTreeMap<String, f64>,
}

impl FinancialMetrics {
    /// Categories ordered by spend, largest first.
    pub fn top_categories(&self) -> Vec<(String, f64)> {
        let mut categories: Vec<(String, f64)> = self
            .category_breakdown
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        categories.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        categories
    }
}

pub struct MetricsAggregator<'a> {
    statement: &'a FinancialStatement,
    teams: &'a [Team],
    view: AttributionView<'a>,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(
        statement: &'a FinancialStatement,
        teams: &'a [Team],
        view: AttributionView<'a>,
    ) -> Self {
        Self {
            statement,
            teams,
            view,
        }
    }

    /// Owned portion of (assets, liabilities). Transactions are not involved.
    pub fn balance_sheet(&self) -> (f64, f64) {
        let mut assets = 0.0;
        let mut liabilities = 0.0;

        for item in self.statement.balance_items() {
            let fraction = self.owned_fraction(item);
            match item {
                BalanceItem::Asset(asset) => assets += asset.value * fraction,
                BalanceItem::Liability(liability) => liabilities += liability.balance * fraction,
            }
        }

        (assets, liabilities)
    }

    pub fn net_worth(&self) -> f64 {
        self.statement
            .balance_items()
            .map(|item| item.signed_value() * self.owned_fraction(item))
            .sum()
    }

    fn owned_fraction(&self, item: BalanceItem<'_>) -> f64 {
        match self.view {
            AttributionView::Member { user_id } => {
                resolve_ownership_fraction(item, user_id, user_id, self.teams)
            }
            AttributionView::WholeStatement => 1.0,
        }
    }

    pub fn compute(&self, period: &PeriodFilter) -> FinancialMetrics {
        let mut metrics = FinancialMetrics::default();
        (metrics.total_assets, metrics.total_liabilities) = self.balance_sheet();

        let mut matched = 0usize;
        for tx in self
            .statement
            .transactions
            .iter()
            .filter(|t| period.matches(t.date))
        {
            matched += 1;
            if tx.is_income() {
                let income = self.income_of(tx);
                metrics.total_income += income;
                if tx.is_passive {
                    metrics.passive_income += income;
                }
            } else {
                let cost = self.expense_of(tx);
                if cost == 0.0 {
                    continue;
                }
                metrics.total_expenses += cost;
                *metrics
                    .category_breakdown
                    .entry(tx.category.clone())
                    .or_insert(0.0) += cost;
            }
        }

        metrics.net_worth = self.net_worth();
        metrics.cash_flow = metrics.total_income - metrics.total_expenses;

        debug!(
            "Metrics over {} transaction(s) for {:?}: net worth {:.2}, cash flow {:.2}",
            matched, period, metrics.net_worth, metrics.cash_flow
        );

        metrics
    }

    pub fn income_of(&self, tx: &Transaction) -> f64 {
        match self.view {
            AttributionView::Member { user_id } => {
                tx.attributed_income(user_id, user_id, self.teams)
            }
            AttributionView::WholeStatement => tx.amount,
        }
    }

    pub fn expense_of(&self, tx: &Transaction) -> f64 {
        match self.view {
            AttributionView::Member { user_id } => {
                tx.attributed_expense(user_id, user_id, self.teams)
            }
            AttributionView::WholeStatement => tx.amount,
        }
    }
}

/// Metrics for one user over an effective statement.
pub fn compute_metrics(
    statement: &FinancialStatement,
    user: &User,
    teams: &[Team],
    period: &PeriodFilter,
) -> FinancialMetrics {
    MetricsAggregator::new(statement, teams, AttributionView::Member { user_id: &user.id })
        .compute(period)
}

/// Metrics for a team dashboard, counting the team's statement in full.
pub fn compute_team_metrics(team: &Team, period: &PeriodFilter) -> FinancialMetrics {
    MetricsAggregator::new(
        &team.financial_statement,
        std::slice::from_ref(team),
        AttributionView::WholeStatement,
    )
    .compute(period)
}
