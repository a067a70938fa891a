//! Money amount with an optional currency code

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::ValueType;
use super::filter::{FilterMode, Filters};
use crate::error::{Result as CrateResult, ValueError};
use crate::orm::{ColumnValue, FieldKind, FieldType, SqlValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    amount: Decimal,
    code: Option<String>,
}

impl Currency {
    pub fn new(amount: Decimal) -> Self {
        Self { amount, code: None }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_uppercase());
        self
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

fn parse_amount(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

impl ValueType for Currency {
    const TYPE_NAME: &'static str = "Currency";
    const FILTERS: Filters = Filters::SANITIZE.special_char(FilterMode::Remove);

    /// Numeric amount, optionally followed by a three-letter code (`1299,90CZK`).
    fn parse(value: String) -> Result<Self, ValueError> {
        let value = value.replace(",-", "").replace(',', ".");
        let number = value.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let code = &value[number.len()..];
        if !code.is_empty() && code.len() != 3 {
            return Err(ValueError::invalid(
                Self::TYPE_NAME,
                format!("`{code}` is not a currency code"),
            ));
        }

        let amount = parse_amount(number).ok_or_else(|| {
            ValueError::invalid(Self::TYPE_NAME, format!("`{number}` is not a number"))
        })?;
        let currency = Self::new(amount);
        Ok(if code.is_empty() {
            currency
        } else {
            currency.with_code(code)
        })
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} {}", self.amount, code),
            None => write!(f, "{}", self.amount),
        }
    }
}

/// Only the amount goes on the wire.
impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.amount, serializer)
    }
}

impl FieldType for Currency {
    const KIND: FieldKind = FieldKind::Value;

    fn from_column(value: ColumnValue) -> CrateResult<Self> {
        let text = value.into_text(Self::TYPE_NAME)?;
        let amount = parse_amount(text.trim()).ok_or_else(|| {
            ValueError::invalid(Self::TYPE_NAME, format!("`{text}` is not a number"))
        })?;
        Ok(Self::new(amount))
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Decimal(self.amount)
    }
}
