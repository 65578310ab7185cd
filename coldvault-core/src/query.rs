//! Retention query.
//!
//! The cutoff travels as a bound parameter. Remote backends send
//! [`ParameterizedQuery`]; local backends evaluate [`RecordQuery::matches`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::constants::{CUTOFF_FORMAT, CUTOFF_FORMAT_MICROS, FIELD_DATE};
use crate::error::{ColdVaultResult, ValidationError};
use crate::record::Record;

/// Query text sent to document stores. `@cutoff` is always bound separately.
pub const DATE_BEFORE_QUERY: &str = "SELECT * FROM c WHERE c.date < @cutoff";

/// Name of the bound cutoff parameter.
pub const CUTOFF_PARAM: &str = "@cutoff";

/// Cross-partition query for records whose `date` sorts before a cutoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    cutoff: String,
}

impl RecordQuery {
    /// Records whose `date` compares lexicographically below `cutoff`.
    pub fn date_before(cutoff: impl Into<String>) -> Self {
        Self {
            cutoff: cutoff.into(),
        }
    }

    /// Records older than `retention` as seen from `now`.
    ///
    /// Fails when `now - retention` falls outside the representable range.
    pub fn older_than(now: DateTime<Utc>, retention: Duration) -> ColdVaultResult<Self> {
        let cutoff = now
            .checked_sub_signed(retention)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "retention".to_string(),
                reason: format!("{} days before {} is out of range", retention.num_days(), now),
            })?;
        Ok(Self::date_before(format_cutoff(cutoff)))
    }

    pub fn cutoff(&self) -> &str {
        &self.cutoff
    }

    /// Local evaluation. Records without a string `date` never match.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(FIELD_DATE) {
            Some(Value::String(date)) => date.as_str() < self.cutoff.as_str(),
            _ => false,
        }
    }

    /// Query text plus bound parameters, for stores that speak SQL-like queries.
    pub fn to_parameterized(&self) -> ParameterizedQuery {
        ParameterizedQuery {
            query: DATE_BEFORE_QUERY.to_string(),
            parameters: vec![QueryParameter {
                name: CUTOFF_PARAM.to_string(),
                value: Value::String(self.cutoff.clone()),
            }],
        }
    }
}

/// Wire form of a parameterized document query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterizedQuery {
    pub query: String,
    pub parameters: Vec<QueryParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// Render a timestamp the way record dates are written (naive UTC ISO-8601).
///
/// Sub-second precision is truncated to microseconds and omitted entirely
/// when zero, so a record dated exactly at the cutoff in whole seconds does
/// not sort below it.
pub fn format_cutoff(ts: DateTime<Utc>) -> String {
    let format = if ts.timestamp_subsec_micros() == 0 {
        CUTOFF_FORMAT
    } else {
        CUTOFF_FORMAT_MICROS
    };
    ts.naive_utc().format(format).to_string()
}
