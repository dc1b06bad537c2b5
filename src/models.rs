use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// JWT claims carried on every authenticated request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthPayload {
    pub sub: String, // username
    pub exp: usize,
}

/// Month totals shown on the dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub income: Decimal,
    pub total_fixed: Decimal,
    pub total_variable: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
}
