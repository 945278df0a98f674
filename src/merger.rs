use crate::ownership::OwnershipMode;
use crate::schema::{
    Asset, BalanceItem, FinancialStatement, Liability, OwnershipShare, Team, Transaction, User,
};
use log::debug;
use std::collections::HashMap;

/// Builds a user's effective statement: the personal statement plus the
/// statements of every team the user belongs to.
pub struct StatementMerger<'a> {
    user: &'a User,
    teams: &'a [Team],
}

impl<'a> StatementMerger<'a> {
    pub fn new(user: &'a User, teams: &'a [Team]) -> Self {
        Self { user, teams }
    }

    pub fn merge(&self) -> FinancialStatement {
        let mut merged = self.user.financial_statement.clone();

        for team in self.teams.iter().filter(|t| t.is_member(&self.user.id)) {
            let statement = &team.financial_statement;

            // Transactions keep their full amount; expense shares decide the
            // personal cost later on.
            merged
                .transactions
                .extend(statement.transactions.iter().cloned());

            merged.assets.extend(
                statement
                    .assets
                    .iter()
                    .map(|asset| self.scale_asset(team, asset)),
            );
            merged.liabilities.extend(
                statement
                    .liabilities
                    .iter()
                    .map(|liability| self.scale_liability(team, liability)),
            );
        }

        FinancialStatement {
            transactions: dedup_by_id(merged.transactions, |t: &Transaction| t.id.clone()),
            assets: dedup_by_id(merged.assets, |a: &Asset| a.id.clone()),
            liabilities: dedup_by_id(merged.liabilities, |l: &Liability| l.id.clone()),
        }
    }

    fn team_item_fraction(&self, team: &Team, item: BalanceItem<'_>) -> f64 {
        match OwnershipMode::of_item(item) {
            mode @ OwnershipMode::ExplicitShares(_) => mode.fraction_for(&self.user.id, "", self.teams),
            _ => team.equal_share(&self.user.id),
        }
    }

    fn scale_asset(&self, team: &Team, asset: &Asset) -> Asset {
        let fraction = self.team_item_fraction(team, BalanceItem::Asset(asset));
        let mut scaled = asset.clone();
        scaled.value = asset.value * fraction;
        scaled.team_id = Some(team.id.clone());
        scaled.shares = Some(self.synthetic_shares());
        scaled.merged_fraction = Some(fraction);
        scaled
    }

    fn scale_liability(&self, team: &Team, liability: &Liability) -> Liability {
        let fraction = self.team_item_fraction(team, BalanceItem::Liability(liability));
        let mut scaled = liability.clone();
        scaled.balance = liability.balance * fraction;
        scaled.team_id = Some(team.id.clone());
        scaled.shares = Some(self.synthetic_shares());
        scaled.merged_fraction = Some(fraction);
        scaled
    }

    /// The merged value is already this user's portion, so it is owned in full.
    fn synthetic_shares(&self) -> Vec<OwnershipShare> {
        vec![OwnershipShare {
            user_id: self.user.id.clone(),
            percentage: 100.0,
        }]
    }
}

pub fn merge_effective_statement(user: &User, teams: &[Team]) -> FinancialStatement {
    StatementMerger::new(user, teams).merge()
}

/// Keeps the first position of each id and the last value seen for it.
fn dedup_by_id<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut result: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        let id = key(&item);
        match positions.get(&id) {
            Some(&idx) => {
                debug!("Collapsing duplicate entry {} in effective statement", id);
                result[idx] = item;
            }
            None => {
                positions.insert(id, result.len());
                result.push(item);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PaymentShare, TransactionType};
    use chrono::NaiveDate;

    fn tx(id: &str, amount: f64, team_id: Option<&str>) -> Transaction {
        Transaction {
            id: id.to_string(),
            description: id.to_string(),
            amount,
            transaction_type: TransactionType::Expense,
            category: "Misc".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            is_passive: false,
            team_id: team_id.map(str::to_string),
            receipt_url: None,
            source_asset_id: None,
            payment_shares: vec![PaymentShare {
                user_id: "alice".to_string(),
                account_id: "a1".to_string(),
                amount,
            }],
            expense_shares: vec![],
        }
    }

    fn asset(id: &str, value: f64) -> Asset {
        Asset {
            id: id.to_string(),
            name: id.to_string(),
            value,
            team_id: None,
            shares: None,
            merged_fraction: None,
            stock: None,
        }
    }

    fn user_with_statement() -> User {
        let mut user = User::new("alice", "Alice");
        user.financial_statement.transactions.push(tx("p1", 20.0, None));
        user.financial_statement.assets.push(asset("savings", 500.0));
        user
    }

    #[test]
    fn test_merge_without_teams_is_identity() {
        let user = user_with_statement();
        let merged = merge_effective_statement(&user, &[]);
        assert_eq!(merged, user.financial_statement);
    }

    #[test]
    fn test_team_assets_are_scaled_and_transactions_kept_whole() {
        let user = user_with_statement();
        let mut team = Team::new(
            "team-1",
            "Household",
            vec!["alice".to_string(), "bob".to_string()],
        );
        let mut house = asset("house", 1000.0);
        house.team_id = Some("team-1".to_string());
        team.financial_statement.assets.push(house);
        team.financial_statement.liabilities.push(Liability {
            id: "mortgage".to_string(),
            name: "Mortgage".to_string(),
            balance: 600.0,
            team_id: Some("team-1".to_string()),
            shares: None,
            merged_fraction: None,
        });
        team.financial_statement
            .transactions
            .push(tx("t1", 90.0, Some("team-1")));

        let teams = vec![team];
        let merged = merge_effective_statement(&user, &teams);

        let house = merged.asset("house").unwrap();
        assert_eq!(house.value, 500.0);
        assert_eq!(house.merged_fraction, Some(0.5));
        assert_eq!(house.shares.as_ref().unwrap()[0].percentage, 100.0);
        assert_eq!(merged.liabilities[0].balance, 300.0);
        assert_eq!(merged.transaction("t1").unwrap().amount, 90.0);

        // inputs untouched
        assert_eq!(teams[0].financial_statement.assets[0].value, 1000.0);
        assert!(teams[0].financial_statement.assets[0].shares.is_none());
    }

    #[test]
    fn test_non_member_team_is_ignored() {
        let user = user_with_statement();
        let mut team = Team::new("team-2", "Other", vec!["bob".to_string()]);
        team.financial_statement.assets.push(asset("boat", 100.0));
        let merged = merge_effective_statement(&user, &[team]);
        assert!(merged.asset("boat").is_none());
    }

    #[test]
    fn test_duplicate_ids_collapse_last_wins() {
        let user = user_with_statement();
        let members = vec!["alice".to_string(), "bob".to_string()];
        let mut first = Team::new("team-1", "A", members.clone());
        first
            .financial_statement
            .transactions
            .push(tx("shared", 10.0, Some("team-1")));
        let mut second = Team::new("team-2", "B", members);
        second
            .financial_statement
            .transactions
            .push(tx("shared", 12.0, Some("team-2")));

        let merged = merge_effective_statement(&user, &[first, second]);
        let shared: Vec<_> = merged
            .transactions
            .iter()
            .filter(|t| t.id == "shared")
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].amount, 12.0);
        assert_eq!(merged.transactions[0].id, "p1");
    }
}
