//! Numeric column filters applied to parsed screener rows.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::models::StockInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ne => "!=",
        }
    }

    fn holds(self, cell: f64, value: f64) -> bool {
        match self {
            Self::Gt => cell > value,
            Self::Ge => cell >= value,
            Self::Lt => cell < value,
            Self::Le => cell <= value,
            Self::Eq => cell == value,
            Self::Ne => cell != value,
        }
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(format!("unknown numeric operator '{}'", other)),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter item as the data grid reports it: the value is free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFilterItem {
    pub field: String,
    pub operator: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericFilter<'a> {
    pub field: &'a str,
    pub operator: FilterOperator,
    pub value: f64,
}

impl NumericFilter<'_> {
    /// A row missing the field fails the filter.
    pub fn matches<R: NumericRow + ?Sized>(&self, row: &R) -> bool {
        row.numeric(self.field)
            .is_some_and(|cell| self.operator.holds(cell, self.value))
    }
}

/// Convert grid items into numeric filters.
///
/// Items with a blank value, a value that is not a number or an operator other
/// than the six numeric ones are dropped.
pub fn from_grid_items(items: &[GridFilterItem]) -> Vec<NumericFilter<'_>> {
    items
        .iter()
        .filter_map(|item| {
            let value = item.value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
            Some(NumericFilter {
                field: &item.field,
                operator: item.operator.parse().ok()?,
                value: value.parse::<f64>().ok().filter(|v| !v.is_nan())?,
            })
        })
        .collect()
}

/// Keep the rows every filter holds for, in their original order.
pub fn apply<'r, R: NumericRow>(rows: &'r [R], filters: &[NumericFilter<'_>]) -> Vec<&'r R> {
    rows.iter()
        .filter(|row| filters.iter().all(|filter| filter.matches(*row)))
        .collect()
}

/// A row whose numeric cells can be looked up by column name.
pub trait NumericRow {
    fn numeric(&self, field: &str) -> Option<f64>;
}

impl NumericRow for StockInfo {
    fn numeric(&self, field: &str) -> Option<f64> {
        self.numeric_field(field)
    }
}

impl NumericRow for Map<String, Value> {
    fn numeric(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }
}
