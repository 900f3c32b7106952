//! Users, categories, transactions, budgets and goals

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    Budget, BudgetPeriod, Category, Goal, NewBudget, NewGoal, NewTransaction, Transaction,
    TransactionKind, User, DEFAULT_ALERT_THRESHOLD,
};
use crate::store::LedgerStore;

const TRANSACTION_COLUMNS: &str = r#"
    t.id, t.user_id, t.category_id, c.name, t.amount, t.kind, t.description, t.occurred_at
"#;

const BUDGET_COLUMNS: &str = r#"
    id, user_id, name, category_id, amount, period, start_date, end_date, alert_threshold, is_active
"#;

const GOAL_COLUMNS: &str =
    "id, user_id, title, target_amount, current_amount, target_date, is_achieved";

impl Database {
    // ========== Users ==========

    pub fn create_user(&self, email: &str, name: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (email, name) VALUES (?, ?)",
            params![email, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, name, created_at FROM users WHERE id = ?",
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, email, name, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: parse_datetime(&created_at),
        })
    }

    // ========== Categories ==========

    /// Get or create a category by name for a user
    pub fn upsert_category(&self, user_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO categories (user_id, name) VALUES (?, ?)",
            params![user_id, name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM categories WHERE user_id = ? AND name = ?",
            params![user_id, name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, user_id, name FROM categories WHERE user_id = ? ORDER BY name")?;
        let categories = stmt
            .query_map(params![user_id], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    // ========== Transactions ==========

    pub fn create_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        if !(tx.amount.is_finite() && tx.amount > 0.0) {
            return Err(Error::InvalidData(format!(
                "Transaction amount must be positive, got {}",
                tx.amount
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, category_id, amount, kind, description, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.category_id,
                tx.amount,
                tx.kind.as_str(),
                tx.description,
                format_datetime(tx.occurred_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions t LEFT JOIN categories c ON c.id = t.category_id WHERE t.id = ?",
            TRANSACTION_COLUMNS
        );
        let tx = conn
            .query_row(&sql, params![id], Self::row_to_transaction)
            .optional()?;
        Ok(tx)
    }

    /// Most recent transactions first
    pub fn list_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = ?
            ORDER BY t.occurred_at DESC, t.id DESC
            LIMIT ?
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(params![user_id, limit], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        let kind: String = row.get(5)?;
        let occurred_at: String = row.get(7)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            category_name: row.get(3)?,
            amount: row.get(4)?,
            kind: kind.parse().unwrap_or(TransactionKind::Expense),
            description: row.get(6)?,
            occurred_at: parse_datetime(&occurred_at),
        })
    }

    // ========== Budgets ==========

    pub fn create_budget(&self, budget: &NewBudget) -> Result<i64> {
        if budget.end_date < budget.start_date {
            return Err(Error::InvalidData(
                "Budget end date is before its start date".to_string(),
            ));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budgets (user_id, name, category_id, amount, period, start_date, end_date, alert_threshold)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                budget.user_id,
                budget.name,
                budget.category_id,
                budget.amount,
                budget.period.as_str(),
                format_datetime(budget.start_date),
                format_datetime(budget.end_date),
                budget.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM budgets WHERE user_id = ? ORDER BY start_date, id",
            BUDGET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let budgets = stmt
            .query_map(params![user_id], Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    pub fn set_budget_active(&self, budget_id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE budgets SET is_active = ? WHERE id = ?",
            params![active, budget_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Budget {}", budget_id)));
        }
        Ok(())
    }

    fn row_to_budget(row: &Row) -> rusqlite::Result<Budget> {
        let period: String = row.get(5)?;
        let start: String = row.get(6)?;
        let end: String = row.get(7)?;
        Ok(Budget {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            category_id: row.get(3)?,
            amount: row.get(4)?,
            period: period.parse().unwrap_or(BudgetPeriod::Custom),
            start_date: parse_datetime(&start),
            end_date: parse_datetime(&end),
            alert_threshold: row.get(8)?,
            is_active: row.get(9)?,
        })
    }

    // ========== Goals ==========

    pub fn create_goal(&self, goal: &NewGoal) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO goals (user_id, title, target_amount, current_amount, target_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                goal.user_id,
                goal.title,
                goal.target_amount,
                goal.current_amount,
                goal.target_date.map(format_datetime),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_goal_progress(&self, goal_id: i64, current_amount: f64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE goals SET current_amount = ? WHERE id = ?",
            params![current_amount, goal_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Goal {}", goal_id)));
        }
        Ok(())
    }

    pub fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM goals WHERE user_id = ? ORDER BY id", GOAL_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let goals = stmt
            .query_map(params![user_id], Self::row_to_goal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    fn row_to_goal(row: &Row) -> rusqlite::Result<Goal> {
        let target_date: Option<String> = row.get(5)?;
        Ok(Goal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            target_amount: row.get(3)?,
            current_amount: row.get(4)?,
            target_date: target_date.as_deref().map(parse_datetime),
            is_achieved: row.get(6)?,
        })
    }
}

impl LedgerStore for Database {
    fn list_user_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn list_expenses(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = ? AND t.kind = 'expense'
              AND t.occurred_at >= ? AND t.occurred_at <= ?
            ORDER BY t.occurred_at, t.id
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(
                params![user_id, format_datetime(start), format_datetime(end)],
                Self::row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    fn list_active_budgets(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM budgets
            WHERE user_id = ? AND is_active = TRUE
              AND start_date <= ? AND end_date >= ?
            ORDER BY id
            "#,
            BUDGET_COLUMNS
        );
        let now = format_datetime(now);
        let mut stmt = conn.prepare(&sql)?;
        let budgets = stmt
            .query_map(params![user_id, now, now], Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    fn list_open_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM goals WHERE user_id = ? AND is_achieved = FALSE ORDER BY id",
            GOAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let goals = stmt
            .query_map(params![user_id], Self::row_to_goal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    fn mark_goal_achieved(&self, goal_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE goals SET is_achieved = TRUE WHERE id = ?",
            params![goal_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Goal {}", goal_id)));
        }
        Ok(())
    }
}
