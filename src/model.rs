use std::fmt;

use serde::{Deserialize, Serialize};

/// One row of the "last directors' dealings" table.
///
/// Fields are private: a record is built once by the extractor and only read
/// afterwards. Serialized field order follows declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorDealing {
    stock_code: String,
    date: String,
    // Downstream consumers read the capitalized key.
    #[serde(rename = "Beneficiary")]
    beneficiary: String,
    deal_type: String,
    value: i64,
    volume: i64,
    price: f32,
}

impl DirectorDealing {
    pub fn new(
        stock_code: impl Into<String>,
        date: impl Into<String>,
        beneficiary: impl Into<String>,
        deal_type: impl Into<String>,
        value: i64,
        volume: i64,
        price: f32,
    ) -> Self {
        Self {
            stock_code: stock_code.into(),
            date: date.into(),
            beneficiary: beneficiary.into(),
            deal_type: deal_type.into(),
            value,
            volume,
            price,
        }
    }

    pub fn stock_code(&self) -> &str {
        &self.stock_code
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn beneficiary(&self) -> &str {
        &self.beneficiary
    }

    pub fn deal_type(&self) -> &str {
        &self.deal_type
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn volume(&self) -> i64 {
        self.volume
    }

    pub fn price(&self) -> f32 {
        self.price
    }

    /// Compact JSON used for console output, the JSON-lines sink and logs.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Names a record field, for error reporting and the positional column map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StockCode,
    Date,
    Beneficiary,
    DealType,
    Value,
    Volume,
    Price,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::StockCode => "stock_code",
            Field::Date => "date",
            Field::Beneficiary => "beneficiary",
            Field::DealType => "deal_type",
            Field::Value => "value",
            Field::Volume => "volume",
            Field::Price => "price",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
