//! Normalized vehicle records

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single normalized vehicle from the partner feed.
///
/// One instance per CSV data row, immutable once produced by the
/// loader. `external_id` is the VIN, the stable partner-side key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub external_id: String,
    pub category: String,
    pub make: String,
    pub model: String,
    pub manufacture_year: i32,
    pub mileage: u32,
    pub engine_code: Option<String>,
    pub cubic_capacity: Decimal,
    pub acceleration: Option<Decimal>,
    pub fuel_type: String,
    pub power: u32,
    pub transmission_type: String,
    pub drive_wheels: String,
    pub body_type: String,
    pub car_class: Option<String>,
    pub doors: Option<u8>,
    pub color: String,
    pub list_price: Decimal,
    pub sales_price: Decimal,
    pub configuration_number: Option<String>,
    pub available_from: Option<NaiveDate>,
    pub first_registration_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub registration_number: Option<String>,
    pub location_id: Option<String>,
    /// 1-based line in the source file, for error attribution.
    pub source_line: u64,
}

impl VehicleRecord {
    /// Fingerprint of every catalog field except the sales price.
    ///
    /// The sales price is tracked separately so that price changes and
    /// field changes can be detected (and synchronized) independently.
    /// `source_line` is excluded: two runs over the same content must
    /// produce the same digest regardless of row position.
    pub fn fields_digest(&self) -> String {
        let mut hasher = Sha256::new();
        push(&mut hasher, &self.external_id);
        push(&mut hasher, &self.category);
        push(&mut hasher, &self.make);
        push(&mut hasher, &self.model);
        push(&mut hasher, &self.manufacture_year.to_string());
        push(&mut hasher, &self.mileage.to_string());
        push_opt(&mut hasher, self.engine_code.as_deref());
        push(&mut hasher, &self.cubic_capacity.normalize().to_string());
        push_opt(
            &mut hasher,
            self.acceleration.map(|a| a.normalize().to_string()).as_deref(),
        );
        push(&mut hasher, &self.fuel_type);
        push(&mut hasher, &self.power.to_string());
        push(&mut hasher, &self.transmission_type);
        push(&mut hasher, &self.drive_wheels);
        push(&mut hasher, &self.body_type);
        push_opt(&mut hasher, self.car_class.as_deref());
        push_opt(&mut hasher, self.doors.map(|d| d.to_string()).as_deref());
        push(&mut hasher, &self.color);
        push(&mut hasher, &self.list_price.normalize().to_string());
        push_opt(&mut hasher, self.configuration_number.as_deref());
        push_opt(
            &mut hasher,
            self.available_from.map(|d| d.to_string()).as_deref(),
        );
        push_opt(
            &mut hasher,
            self.first_registration_date.map(|d| d.to_string()).as_deref(),
        );
        push_opt(&mut hasher, self.description.as_deref());
        push_opt(&mut hasher, self.registration_number.as_deref());
        push_opt(&mut hasher, self.location_id.as_deref());
        hex::encode(hasher.finalize())
    }
}

fn push(hasher: &mut Sha256, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update([0x1f]);
}

fn push_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([0x01]);
            push(hasher, v);
        }
        None => hasher.update([0x00, 0x1f]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> VehicleRecord {
        VehicleRecord {
            external_id: "WVWZZZ1JZXW000001".to_string(),
            category: "PASSENGER".to_string(),
            make: "Volkswagen".to_string(),
            model: "Golf".to_string(),
            manufacture_year: 2021,
            mileage: 42_000,
            engine_code: Some("DTR".to_string()),
            cubic_capacity: dec!(1968),
            acceleration: Some(dec!(8.5)),
            fuel_type: "DIESEL".to_string(),
            power: 150,
            transmission_type: "AUTOMATIC".to_string(),
            drive_wheels: "FRONT".to_string(),
            body_type: "HATCHBACK".to_string(),
            car_class: None,
            doors: Some(5),
            color: "Grey".to_string(),
            list_price: dec!(98000),
            sales_price: dec!(92000),
            configuration_number: None,
            available_from: None,
            first_registration_date: None,
            description: None,
            registration_number: None,
            location_id: None,
            source_line: 2,
        }
    }

    #[test]
    fn digest_ignores_sales_price_and_line() {
        let a = record();
        let mut b = record();
        b.sales_price = dec!(89000);
        b.source_line = 17;
        assert_eq!(a.fields_digest(), b.fields_digest());
    }

    #[test]
    fn digest_changes_with_catalog_fields() {
        let a = record();
        let mut b = record();
        b.mileage = 43_000;
        assert_ne!(a.fields_digest(), b.fields_digest());
    }

    #[test]
    fn digest_distinguishes_none_from_empty() {
        let mut a = record();
        let mut b = record();
        a.description = None;
        b.description = Some(String::new());
        assert_ne!(a.fields_digest(), b.fields_digest());
    }

    #[test]
    fn digest_is_stable_across_decimal_scale() {
        let a = record();
        let mut b = record();
        b.list_price = dec!(98000.00);
        assert_eq!(a.fields_digest(), b.fields_digest());
    }
}
