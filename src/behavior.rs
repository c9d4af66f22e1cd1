//! Rule-based spending behavior labels

use crate::error::SegmentError;
use std::fmt;
use std::str::FromStr;

/// Annual income (k$) at or above which a customer counts as high income
pub const HIGH_INCOME: f64 = 70.0;
/// Annual income (k$) below which a customer counts as low income
pub const LOW_INCOME: f64 = 40.0;
/// Spending score at or above which a customer counts as a high spender
pub const HIGH_SPENDING: f64 = 60.0;
/// Spending score below which a customer counts as a low spender
pub const LOW_SPENDING: f64 = 40.0;

/// Behavior category derived from income and spending score.
///
/// Independent of the cluster id: two customers in the same cluster can carry
/// different labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Behavior {
    HighIncomeHighSpending,
    HighIncomeLowSpending,
    LowIncomeHighSpending,
    LowIncomeLowSpending,
}

impl Behavior {
    /// All labels, in rule order
    pub const ALL: [Behavior; 4] = [
        Behavior::HighIncomeHighSpending,
        Behavior::HighIncomeLowSpending,
        Behavior::LowIncomeHighSpending,
        Behavior::LowIncomeLowSpending,
    ];

    /// Classify a customer.
    ///
    /// Rules are checked in order and the last one is a catch-all, so mid-range
    /// customers (income in [40, 70), or high income with spending in [40, 60))
    /// end up as "Low Income, Low Spending".
    pub fn classify(income: f64, spending: f64) -> Self {
        if income >= HIGH_INCOME && spending >= HIGH_SPENDING {
            Behavior::HighIncomeHighSpending
        } else if income >= HIGH_INCOME && spending < LOW_SPENDING {
            Behavior::HighIncomeLowSpending
        } else if income < LOW_INCOME && spending >= HIGH_SPENDING {
            Behavior::LowIncomeHighSpending
        } else {
            Behavior::LowIncomeLowSpending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Behavior::HighIncomeHighSpending => "High Income, High Spending",
            Behavior::HighIncomeLowSpending => "High Income, Low Spending",
            Behavior::LowIncomeHighSpending => "Low Income, High Spending",
            Behavior::LowIncomeLowSpending => "Low Income, Low Spending",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Behavior {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Behavior::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SegmentError::UnknownBehavior(s.to_string()))
    }
}
