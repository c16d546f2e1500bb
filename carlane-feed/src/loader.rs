//! CSV loading with per-row error collection
//!
//! Bad rows never abort a load: each failure is recorded as a
//! [`RowError`] carrying the source line and the run proceeds with the
//! remaining records. The errors travel untouched all the way into the
//! final synchronization report.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{FeedError, Result};
use crate::normalize::clean_row;
use crate::record::VehicleRecord;

/// A validation error tied to a specific CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub line: u64,
    pub vin: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vin {
            Some(vin) => write!(f, "line {} (VIN {}): {}", self.line, vin, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Result of loading a feed file: valid records plus row-level errors.
#[derive(Debug, Default, Clone)]
pub struct FeedBatch {
    pub records: Vec<VehicleRecord>,
    pub errors: Vec<RowError>,
}

/// Load vehicle records from a CSV file.
pub fn load_from_csv(path: impl AsRef<Path>) -> Result<FeedBatch> {
    let path = path.as_ref();
    debug!("Loading feed from {}", path.display());
    let file = File::open(path)?;
    load_from_reader(file)
}

/// Load vehicle records from any reader producing the partner CSV.
pub fn load_from_reader<R: Read>(reader: R) -> Result<FeedBatch> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut batch = FeedBatch::default();
    for (index, result) in csv_reader.records().enumerate() {
        // Header occupies line 1; data rows start at 2.
        let fallback_line = index as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                batch.errors.push(RowError {
                    line: fallback_line,
                    vin: None,
                    message: err.to_string(),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);

        let mut row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        clean_row(&mut row);

        match record_from_row(&row, line) {
            Ok(vehicle) => batch.records.push(vehicle),
            Err(err) => batch.errors.push(RowError {
                line,
                vin: optional(&row, "vin"),
                message: err.to_string(),
            }),
        }
    }

    debug!(
        "Loaded {} records, {} row errors",
        batch.records.len(),
        batch.errors.len()
    );
    Ok(batch)
}

/// Build a [`VehicleRecord`] from a cleaned row.
fn record_from_row(row: &HashMap<String, String>, line: u64) -> Result<VehicleRecord> {
    let mut missing: Vec<&str> = Vec::new();
    let mut require = |name: &'static str| -> String {
        let value = field(row, name);
        if value.is_empty() {
            missing.push(name);
        }
        value.to_string()
    };

    let external_id = require("vin");
    let category = require("category");
    let make = require("make");
    let model = require("model");
    let manufacture_year = require("manufactureYear");
    let mileage = require("mileage");
    let cubic_capacity = require("cubicCapacity");
    let fuel_type = require("fuelType");
    let power = require("power");
    let transmission_type = require("transmissionType");
    let drive_wheels = require("driveWheels");
    let body_type = require("type");
    let color = require("color");
    let list_price = require("pricing_listPrice");
    let sales_price = require("pricing_salesPrice");

    if !missing.is_empty() {
        missing.sort_unstable();
        missing.dedup();
        return Err(FeedError::MissingFields {
            fields: missing.join(", "),
        });
    }

    let doors = match parse_optional_int(row, "doors")? {
        Some(0) | None => None,
        Some(doors) => Some(bounded(doors, "doors")?),
    };

    Ok(VehicleRecord {
        external_id,
        category,
        make,
        model,
        manufacture_year: parse_int(&manufacture_year, "manufactureYear")? as i32,
        mileage: bounded(parse_int(&mileage, "mileage")?, "mileage")?,
        engine_code: optional(row, "engineCode"),
        cubic_capacity: parse_decimal(&cubic_capacity, "cubicCapacity")?,
        acceleration: parse_optional_decimal(row, "acceleration")?,
        fuel_type,
        power: bounded(parse_int(&power, "power")?, "power")?,
        transmission_type,
        drive_wheels,
        body_type,
        car_class: optional(row, "carClass"),
        doors,
        color,
        list_price: parse_decimal(&list_price, "pricing_listPrice")?,
        sales_price: parse_decimal(&sales_price, "pricing_salesPrice")?,
        configuration_number: optional(row, "configurationNumber"),
        available_from: parse_optional_date(row, "availableFrom")?,
        first_registration_date: parse_optional_date(row, "firstRegistrationDate")?,
        description: optional(row, "description"),
        registration_number: optional(row, "registrationNumber"),
        location_id: optional(row, "locationId"),
        source_line: line,
    })
}

fn field<'a>(row: &'a HashMap<String, String>, name: &str) -> &'a str {
    row.get(name).map(String::as_str).unwrap_or("")
}

fn optional(row: &HashMap<String, String>, name: &str) -> Option<String> {
    let value = field(row, name);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_decimal(value: &str, name: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|_| FeedError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_optional_decimal(row: &HashMap<String, String>, name: &str) -> Result<Option<Decimal>> {
    match field(row, name) {
        "" => Ok(None),
        value => parse_decimal(value, name).map(Some),
    }
}

/// Integers arrive as decimals in the export; round half-up like the
/// partner's own tooling does.
fn parse_int(value: &str, name: &str) -> Result<i64> {
    let decimal = parse_decimal(value, name)?;
    decimal
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| FeedError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
        })
}

fn parse_optional_int(row: &HashMap<String, String>, name: &str) -> Result<Option<i64>> {
    match field(row, name) {
        "" => Ok(None),
        value => parse_int(value, name).map(Some),
    }
}

fn parse_optional_date(row: &HashMap<String, String>, name: &str) -> Result<Option<NaiveDate>> {
    match field(row, name) {
        "" => Ok(None),
        value => NaiveDate::from_str(value)
            .map(Some)
            .map_err(|_| FeedError::InvalidDate(value.to_string())),
    }
}

fn bounded<T: TryFrom<i64>>(value: i64, name: &str) -> Result<T> {
    T::try_from(value).map_err(|_| FeedError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
    })
}
