//! Net worth history replayed from the transaction log.
//!
//! The starting point is today's asset and liability valuation; transactions
//! are then folded forward in date order. Asset values are assumed constant
//! over the whole log because no valuation history is recorded.

use crate::merger::merge_effective_statement;
use crate::metrics::{AttributionView, MetricsAggregator};
use crate::schema::{HistoricalDataPoint, Team, Transaction, User};
use crate::utils::month_end;
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct MonthRollup {
    cash_flow: f64,
    passive_income: f64,
    expenses: f64,
    closing_net_worth: f64,
}

pub struct HistoryBuilder<'a> {
    user: &'a User,
    teams: &'a [Team],
}

impl<'a> HistoryBuilder<'a> {
    pub fn new(user: &'a User, teams: &'a [Team]) -> Self {
        Self { user, teams }
    }

    pub fn build(&self) -> Vec<HistoricalDataPoint> {
        let statement = merge_effective_statement(self.user, self.teams);
        let aggregator = MetricsAggregator::new(
            &statement,
            self.teams,
            AttributionView::Member {
                user_id: &self.user.id,
            },
        );
        let starting_net_worth = aggregator.net_worth();

        let mut transactions: Vec<&Transaction> = statement.transactions.iter().collect();
        transactions.sort_by_key(|t| t.date);

        let mut points: BTreeMap<NaiveDate, HistoricalDataPoint> = BTreeMap::new();
        let mut months: BTreeMap<NaiveDate, MonthRollup> = BTreeMap::new();
        let mut running = starting_net_worth;

        for tx in &transactions {
            let rollup = months.entry(month_end(tx.date)).or_default();

            if tx.is_income() {
                let income = aggregator.income_of(tx);
                running += income;
                rollup.cash_flow += income;
                if tx.is_passive {
                    rollup.passive_income += income;
                }
            } else {
                let cost = aggregator.expense_of(tx);
                running -= cost;
                rollup.cash_flow -= cost;
                rollup.expenses += cost;
            }
            rollup.closing_net_worth = running;

            // later transactions on the same day overwrite: the point is end-of-day
            points.insert(
                tx.date,
                HistoricalDataPoint {
                    date: tx.date,
                    net_worth: running,
                    cash_flow: None,
                    passive_income: None,
                    expenses: None,
                },
            );
        }

        for (date, rollup) in months {
            let point = points.entry(date).or_insert_with(|| HistoricalDataPoint {
                date,
                net_worth: rollup.closing_net_worth,
                cash_flow: None,
                passive_income: None,
                expenses: None,
            });
            point.cash_flow = Some(rollup.cash_flow);
            point.passive_income = Some(rollup.passive_income);
            point.expenses = Some(rollup.expenses);
        }

        debug!(
            "Replayed {} transaction(s) for {} into {} history point(s), starting from {:.2}",
            transactions.len(),
            self.user.id,
            points.len(),
            starting_net_worth
        );

        points.into_values().collect()
    }
}

pub fn build_net_worth_history(user: &User, teams: &[Team]) -> Vec<HistoricalDataPoint> {
    HistoryBuilder::new(user, teams).build()
}
