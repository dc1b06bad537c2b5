use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Summary;

/// Recurring expense entry; lives in the global catalog and in the
/// per-month snapshots. On-disk keys keep the original document format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FixedExpense {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "importe")]
    pub amount: Decimal,
}

/// One-off dated expense recorded inside a specific month.
/// `date` is a "DD/MM" string, exactly as entered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariableExpense {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "importe")]
    pub amount: Decimal,
    #[serde(rename = "fecha")]
    pub date: String,
}

/// A named month: its income, the fixed-expense snapshot taken at creation
/// time, and the variable expenses logged into it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Month {
    #[serde(rename = "ingreso")]
    pub income: Decimal,
    #[serde(rename = "gastos_fijos")]
    pub fixed: Vec<FixedExpense>,
    #[serde(rename = "gastos_variables")]
    pub variable: Vec<VariableExpense>,
}

impl Month {
    /// Totals for the dashboard: sums are exact Decimal arithmetic.
    pub fn summary(&self) -> Summary {
        let total_fixed: Decimal = self.fixed.iter().map(|g| g.amount).sum();
        let total_variable: Decimal = self.variable.iter().map(|g| g.amount).sum();
        let total_expense = total_fixed + total_variable;
        Summary {
            income: self.income,
            total_fixed,
            total_variable,
            total_expense,
            balance: self.income - total_expense,
        }
    }

    /// Variable expenses sorted most-recent-first by their "DD/MM" date
    /// string (dashboard view order; storage order is untouched).
    pub fn variable_by_recent_date(&self) -> Vec<VariableExpense> {
        let mut sorted = self.variable.clone();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }
}

/// The whole per-user budget document. Fully rewritten on every save.
///
/// `months` is insertion-ordered: deleting the current month promotes the
/// first remaining month in insertion order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BudgetBook {
    #[serde(rename = "mes_actual")]
    pub current: Option<String>,
    #[serde(rename = "gastos_fijos")]
    pub fixed_catalog: Vec<FixedExpense>,
    #[serde(rename = "meses")]
    pub months: IndexMap<String, Month>,
}

/// Recoverable, user-facing failures of the document operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BookError {
    MonthExists(String),
    UnknownMonth(String),
    NonPositiveIncome,
    NonPositiveAmount,
    NoCurrentMonth,
    ExpenseOutOfRange(usize),
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::MonthExists(name) => write!(f, "month '{}' already exists", name),
            BookError::UnknownMonth(name) => write!(f, "month '{}' does not exist", name),
            BookError::NonPositiveIncome => write!(f, "income must be greater than zero"),
            BookError::NonPositiveAmount => write!(f, "amount must be greater than zero"),
            BookError::NoCurrentMonth => write!(f, "no month selected"),
            BookError::ExpenseOutOfRange(idx) => write!(f, "expense {} does not exist", idx),
        }
    }
}

impl std::error::Error for BookError {}

impl BudgetBook {
    /// Current month by name, when the pointer is set and resolves.
    pub fn current_month(&self) -> Option<(&str, &Month)> {
        let name = self.current.as_deref()?;
        self.months.get(name).map(|m| (name, m))
    }

    /// Create a month with the given income, snapshot the global fixed
    /// catalog into it, and make it current.
    pub fn create_month(&mut self, name: &str, income: Decimal) -> Result<(), BookError> {
        if self.months.contains_key(name) {
            return Err(BookError::MonthExists(name.to_string()));
        }
        if income <= Decimal::ZERO {
            return Err(BookError::NonPositiveIncome);
        }
        self.months.insert(
            name.to_string(),
            Month {
                income,
                fixed: self.fixed_catalog.clone(),
                variable: Vec::new(),
            },
        );
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Point `current` at an existing month. Unknown names are rejected
    /// rather than left dangling.
    pub fn switch_month(&mut self, name: &str) -> Result<(), BookError> {
        if !self.months.contains_key(name) {
            return Err(BookError::UnknownMonth(name.to_string()));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Delete the current month and promote the first remaining month in
    /// insertion order (or none). Returns the deleted name.
    pub fn delete_month(&mut self) -> Result<String, BookError> {
        let name = self.current.take().ok_or(BookError::NoCurrentMonth)?;
        // shift_remove keeps the relative order of the remaining months
        self.months.shift_remove(&name);
        self.current = self.months.keys().next().cloned();
        Ok(name)
    }

    /// Append a dated expense to the current month.
    pub fn add_variable_expense(
        &mut self,
        description: &str,
        amount: Decimal,
        day: &str,
        month: &str,
    ) -> Result<(), BookError> {
        let name = self.current.clone().ok_or(BookError::NoCurrentMonth)?;
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount);
        }
        let entry = self
            .months
            .get_mut(&name)
            .ok_or(BookError::UnknownMonth(name))?;
        entry.variable.push(VariableExpense {
            description: description.to_string(),
            amount,
            date: format!("{}/{}", day, month),
        });
        Ok(())
    }

    /// Remove a variable expense from the current month by position.
    /// Out-of-range leaves the list untouched.
    pub fn remove_variable_expense(&mut self, index: usize) -> Result<(), BookError> {
        let name = self.current.clone().ok_or(BookError::NoCurrentMonth)?;
        let entry = self
            .months
            .get_mut(&name)
            .ok_or(BookError::UnknownMonth(name))?;
        if index >= entry.variable.len() {
            return Err(BookError::ExpenseOutOfRange(index));
        }
        entry.variable.remove(index);
        Ok(())
    }

    /// Append to the global fixed catalog. The currently active month, if
    /// any, receives the same entry (retroactive addition); past months are
    /// never touched.
    pub fn add_fixed_expense(&mut self, description: &str, amount: Decimal) -> Result<(), BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount);
        }
        let entry = FixedExpense {
            description: description.to_string(),
            amount,
        };
        self.fixed_catalog.push(entry.clone());
        if let Some(name) = self.current.clone() {
            if let Some(month) = self.months.get_mut(&name) {
                month.fixed.push(entry);
            }
        }
        Ok(())
    }
}
