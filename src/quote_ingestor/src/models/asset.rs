use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tracked crypto asset.
///
/// `id` doubles as the real-time provider's coin id (e.g. `bitcoin`) and as the
/// top-level key segment in the landing store; `symbol` is the historical
/// provider's ticker (e.g. `BTC-USD`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    /// First day requested when backfilling history.
    pub start_date: NaiveDate,
}

impl Asset {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            start_date,
        }
    }
}
