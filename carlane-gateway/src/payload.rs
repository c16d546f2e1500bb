//! Wire types for the platform REST API
//!
//! The platform expects camelCase JSON with absent (not null) optional
//! keys, prices as strings under a nested `pricing` object, and the
//! body style under the `type` key.

use carlane_feed::VehicleRecord;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_number: Option<String>,
    pub vin: String,
    pub category: String,
    pub make: String,
    pub model: String,
    pub manufacture_year: i32,
    pub mileage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<String>,
    pub cubic_capacity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<Decimal>,
    pub fuel_type: String,
    pub power: u32,
    pub transmission_type: String,
    pub drive_wheels: String,
    #[serde(rename = "type")]
    pub body_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doors: Option<u8>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_registration_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pricing: PricingPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPayload {
    pub list_price: Decimal,
    pub sales_price: Decimal,
}

impl From<&VehicleRecord> for VehiclePayload {
    fn from(record: &VehicleRecord) -> Self {
        Self {
            configuration_number: record.configuration_number.clone(),
            vin: record.external_id.clone(),
            category: record.category.clone(),
            make: record.make.clone(),
            model: record.model.clone(),
            manufacture_year: record.manufacture_year,
            mileage: record.mileage,
            engine_code: record.engine_code.clone(),
            cubic_capacity: record.cubic_capacity.normalize(),
            acceleration: record.acceleration.map(|a| a.normalize()),
            fuel_type: record.fuel_type.clone(),
            power: record.power,
            transmission_type: record.transmission_type.clone(),
            drive_wheels: record.drive_wheels.clone(),
            body_type: record.body_type.clone(),
            car_class: record.car_class.clone(),
            doors: record.doors,
            color: record.color.clone(),
            available_from: record.available_from,
            first_registration_date: record.first_registration_date,
            description: record.description.clone(),
            pricing: PricingPayload {
                list_price: record.list_price.normalize(),
                sales_price: record.sales_price.normalize(),
            },
            registration_number: record.registration_number.clone(),
            location_id: record.location_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdatePayload {
    pub price: Decimal,
    pub notify_discount: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: String,
    pub external_id: String,
    #[serde(default)]
    pub pricing: Option<ListingPricing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPricing {
    #[serde(default)]
    pub sales_price: Option<Decimal>,
}
