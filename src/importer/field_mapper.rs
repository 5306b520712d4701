// ==========================================
// Delivery Window Planner - field mapper
// ==========================================
// Responsibility: source columns -> RawOrderRecord + type conversion
// Schemes: CURRENT (externalOrderId ...) / LEGACY (orderID ...)
// ==========================================

use crate::domain::order::RawOrderRecord;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const TRUTHY_VALUES: [&str; 4] = ["yes", "y", "true", "1"];
const TIME_FORMAT: &str = "%I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnScheme {
    Current,
    Legacy,
}

impl ColumnScheme {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ColumnScheme::Current => &[
                "externalOrderId",
                "customerID",
                "address",
                "numberOfUnits",
                "earlyEligible",
                "deliveryWindow",
            ],
            ColumnScheme::Legacy => &[
                "orderID",
                "customer_name",
                "delivery_address",
                "number_of_units",
                "early_ok",
                "delivery_window_start",
                "delivery_window_end",
            ],
        }
    }
}

impl fmt::Display for ColumnScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnScheme::Current => write!(f, "CURRENT"),
            ColumnScheme::Legacy => write!(f, "LEGACY"),
        }
    }
}

pub struct FieldMapper;

impl FieldMapper {
    /// Picks the scheme by id column and checks its required columns.
    pub fn detect_scheme(&self, headers: &[String]) -> ImportResult<ColumnScheme> {
        let has = |name: &str| headers.iter().any(|h| h == name);
        let scheme = if has("externalOrderId") {
            ColumnScheme::Current
        } else if has("orderID") {
            ColumnScheme::Legacy
        } else {
            return Err(ImportError::UnknownScheme);
        };

        let missing: Vec<&str> = scheme
            .required_columns()
            .iter()
            .copied()
            .filter(|c| !has(c))
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns {
                scheme: scheme.to_string(),
                columns: missing.join(", "),
            });
        }
        Ok(scheme)
    }

    pub fn map_to_raw_order(
        &self,
        scheme: ColumnScheme,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<RawOrderRecord> {
        let (window_start, window_end) = match scheme {
            ColumnScheme::Current => self.parse_combined_window(row, "deliveryWindow", row_number)?,
            ColumnScheme::Legacy => (
                self.parse_time(row, "delivery_window_start", row_number)?,
                self.parse_time(row, "delivery_window_end", row_number)?,
            ),
        };

        Ok(RawOrderRecord {
            order_id: self.get_string(row, "order_id", scheme),
            customer_id: self.get_string(row, "customer_id", scheme),
            address: self.get_string(row, "address", scheme),
            units: self.parse_units(row, scheme, row_number)?,
            early_eligible: self.parse_bool(row, "early_eligible", scheme),
            window_start,
            window_end,
            prior_reschedule_count: self
                .parse_u32(row, "prior_reschedule_count", scheme, row_number)?
                .unwrap_or(0),
            customer_tag: self.get_string(row, "customer_tag", scheme),
            row_number,
        })
    }

    /// First non-empty value among the scheme's aliases for a canonical field.
    fn get_string(&self, row: &HashMap<String, String>, field: &str, scheme: ColumnScheme) -> Option<String> {
        let aliases: &[&str] = match (field, scheme) {
            ("order_id", ColumnScheme::Current) => &["externalOrderId"],
            ("order_id", ColumnScheme::Legacy) => &["orderID"],
            ("customer_id", ColumnScheme::Current) => &["customerID"],
            ("customer_id", ColumnScheme::Legacy) => &["customer_name", "customerID"],
            ("address", ColumnScheme::Current) => &["address"],
            ("address", ColumnScheme::Legacy) => &["delivery_address"],
            ("units", ColumnScheme::Current) => &["numberOfUnits"],
            ("units", ColumnScheme::Legacy) => &["number_of_units"],
            ("early_eligible", ColumnScheme::Current) => &["earlyEligible"],
            ("early_eligible", ColumnScheme::Legacy) => &["early_ok"],
            ("prior_reschedule_count", _) => &["priorRescheduleCount", "prior_reschedule_count"],
            ("customer_tag", _) => &["customerTag", "customer_tag"],
            _ => &[],
        };

        aliases.iter().find_map(|alias| {
            row.get(*alias)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        })
    }

    fn parse_bool(&self, row: &HashMap<String, String>, field: &str, scheme: ColumnScheme) -> bool {
        self.get_string(row, field, scheme)
            .map(|v| TRUTHY_VALUES.contains(&v.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Whole-number units; `12.0` is accepted, `12.5` is not.
    fn parse_units(
        &self,
        row: &HashMap<String, String>,
        scheme: ColumnScheme,
        row_number: usize,
    ) -> ImportResult<Option<i64>> {
        let Some(value) = self.get_string(row, "units", scheme) else {
            return Ok(None);
        };
        if let Ok(n) = value.parse::<i64>() {
            return Ok(Some(n));
        }
        match value.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(Some(f as i64)),
            _ => Err(ImportError::TypeConversionError {
                row: row_number,
                field: "units".to_string(),
                message: format!("not a whole number: {}", value),
            }),
        }
    }

    fn parse_u32(
        &self,
        row: &HashMap<String, String>,
        field: &str,
        scheme: ColumnScheme,
        row_number: usize,
    ) -> ImportResult<Option<u32>> {
        match self.get_string(row, field, scheme) {
            None => Ok(None),
            Some(value) => value
                .parse::<u32>()
                .or_else(|_| match value.parse::<f64>() {
                    Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u32),
                    _ => Err(()),
                })
                .map(Some)
                .map_err(|_| ImportError::TypeConversionError {
                    row: row_number,
                    field: field.to_string(),
                    message: format!("not a non-negative integer: {}", value),
                }),
        }
    }

    fn parse_time(&self, row: &HashMap<String, String>, column: &str, row_number: usize) -> ImportResult<NaiveTime> {
        let value = row.get(column).map(|v| v.trim().to_string()).unwrap_or_default();
        parse_clock(&value).ok_or_else(|| ImportError::WindowFormatError {
            row: row_number,
            field: column.to_string(),
            value,
        })
    }

    /// `"09:00 AM 11:00 AM"` (an optional `-` between the halves is tolerated).
    fn parse_combined_window(
        &self,
        row: &HashMap<String, String>,
        column: &str,
        row_number: usize,
    ) -> ImportResult<(NaiveTime, NaiveTime)> {
        let value = row.get(column).map(|v| v.trim().to_string()).unwrap_or_default();
        let parts: Vec<&str> = value.split_whitespace().filter(|p| *p != "-").collect();
        let err = || ImportError::WindowFormatError {
            row: row_number,
            field: column.to_string(),
            value: value.clone(),
        };
        if parts.len() != 4 {
            return Err(err());
        }
        let start = parse_clock(&format!("{} {}", parts[0], parts[1])).ok_or_else(err)?;
        let end = parse_clock(&format!("{} {}", parts[2], parts[3])).ok_or_else(err)?;
        Ok((start, end))
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(&value.to_uppercase(), TIME_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_scheme() {
        let mapper = FieldMapper;
        let current = headers(ColumnScheme::Current.required_columns());
        assert_eq!(mapper.detect_scheme(&current).unwrap(), ColumnScheme::Current);

        let legacy = headers(ColumnScheme::Legacy.required_columns());
        assert_eq!(mapper.detect_scheme(&legacy).unwrap(), ColumnScheme::Legacy);

        let err = mapper.detect_scheme(&headers(&["id"])).unwrap_err();
        assert!(matches!(err, ImportError::UnknownScheme));

        let err = mapper
            .detect_scheme(&headers(&["orderID", "customer_name"]))
            .unwrap_err();
        match err {
            ImportError::MissingColumns { scheme, columns } => {
                assert_eq!(scheme, "LEGACY");
                assert!(columns.contains("delivery_address"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_current_row() {
        let r = row(&[
            ("externalOrderId", "EXT-1"),
            ("customerID", "C-9"),
            ("address", "12 Elm St"),
            ("numberOfUnits", "14"),
            ("earlyEligible", "Yes"),
            ("deliveryWindow", "09:00 AM 11:00 AM"),
            ("priorRescheduleCount", "1"),
            ("customerTag", "vip"),
        ]);
        let rec = FieldMapper.map_to_raw_order(ColumnScheme::Current, &r, 3).unwrap();
        assert_eq!(rec.order_id.as_deref(), Some("EXT-1"));
        assert_eq!(rec.units, Some(14));
        assert!(rec.early_eligible);
        assert_eq!(rec.window_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(rec.window_end, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(rec.prior_reschedule_count, 1);
        assert_eq!(rec.customer_tag.as_deref(), Some("vip"));
        assert_eq!(rec.row_number, 3);
    }

    #[test]
    fn test_map_legacy_row_defaults() {
        let r = row(&[
            ("orderID", "L-1"),
            ("customer_name", "Ada"),
            ("delivery_address", "1 Loop Rd"),
            ("number_of_units", "8.0"),
            ("early_ok", "no"),
            ("delivery_window_start", "01:00 pm"),
            ("delivery_window_end", "03:00 PM"),
        ]);
        let rec = FieldMapper.map_to_raw_order(ColumnScheme::Legacy, &r, 1).unwrap();
        assert_eq!(rec.customer_id.as_deref(), Some("Ada"));
        assert_eq!(rec.units, Some(8));
        assert!(!rec.early_eligible);
        assert_eq!(rec.window_start, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(rec.prior_reschedule_count, 0);
        assert_eq!(rec.customer_tag, None);
    }

    #[test]
    fn test_bad_window_and_units() {
        let r = row(&[
            ("externalOrderId", "EXT-2"),
            ("numberOfUnits", "3"),
            ("deliveryWindow", "9-11"),
        ]);
        let err = FieldMapper.map_to_raw_order(ColumnScheme::Current, &r, 4).unwrap_err();
        assert!(matches!(err, ImportError::WindowFormatError { row: 4, .. }));

        let r = row(&[
            ("externalOrderId", "EXT-3"),
            ("numberOfUnits", "2.5"),
            ("deliveryWindow", "09:00 AM 11:00 AM"),
        ]);
        let err = FieldMapper.map_to_raw_order(ColumnScheme::Current, &r, 5).unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 5, .. }));
    }
}
