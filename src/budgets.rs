use crate::metrics::FinancialMetrics;
use crate::schema::{Budget, Goal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetProgress {
    pub budget_id: String,
    pub category: String,
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Spent over limit; above 1.0 when the budget is blown. None for a
    /// zero limit.
    pub utilization: Option<f64>,
    pub over_budget: bool,
}

/// Compares each budget against the attributed spend in `metrics`, which
/// should have been computed for the budget's period (normally one month).
pub fn budget_progress(budgets: &[Budget], metrics: &FinancialMetrics) -> Vec<BudgetProgress> {
    budgets
        .iter()
        .map(|budget| {
            let spent = metrics
                .category_breakdown
                .get(&budget.category)
                .copied()
                .unwrap_or(0.0);
            let utilization = (budget.limit > 0.0).then(|| spent / budget.limit);
            BudgetProgress {
                budget_id: budget.id.clone(),
                category: budget.category.clone(),
                limit: budget.limit,
                spent,
                remaining: budget.limit - spent,
                utilization,
                over_budget: spent > budget.limit,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_id: String,
    pub fraction_complete: f64,
    pub remaining: f64,
    pub achieved: bool,
    pub overdue: bool,
}

pub fn goal_progress(goal: &Goal, today: NaiveDate) -> GoalProgress {
    let fraction_complete = if goal.target_amount > 0.0 {
        (goal.current_amount / goal.target_amount).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let achieved = goal.current_amount >= goal.target_amount;
    GoalProgress {
        goal_id: goal.id.clone(),
        fraction_complete,
        remaining: (goal.target_amount - goal.current_amount).max(0.0),
        achieved,
        overdue: !achieved && goal.deadline.is_some_and(|deadline| deadline < today),
    }
}
