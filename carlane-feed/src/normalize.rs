//! Cleanup of raw partner values before validation
//!
//! The partner export uses Polish labels, comma decimal separators and
//! the literal string `NULL` for missing values. Everything here maps
//! that dialect onto the platform vocabulary; validation happens later
//! in the loader.

use std::collections::HashMap;

const DEFAULT_ENGINE_CODE: &str = "-";

/// Normalize a raw CSV row in place.
pub fn clean_row(row: &mut HashMap<String, String>) {
    for value in row.values_mut() {
        *value = prepare_value(value);
    }

    map_field(row, "category", CATEGORY_MAP);
    map_field(row, "fuelType", FUEL_MAP);
    map_field(row, "transmissionType", TRANSMISSION_MAP);
    map_field(row, "driveWheels", DRIVE_WHEELS_MAP);
    map_field(row, "type", BODY_TYPE_MAP);
    map_optional_field(row, "carClass", CAR_CLASS_MAP);

    if row.get("engineCode").map(String::as_str) == Some("") {
        row.insert("engineCode".to_string(), DEFAULT_ENGINE_CODE.to_string());
    }

    for field in ["manufactureYear", "mileage", "power", "doors"] {
        numeric_field(row, field);
    }
    for field in [
        "cubicCapacity",
        "acceleration",
        "pricing_listPrice",
        "pricing_salesPrice",
    ] {
        numeric_field(row, field);
    }

    for field in ["availableFrom", "firstRegistrationDate"] {
        if let Some(value) = row.get_mut(field) {
            *value = normalize_date(value);
        }
    }

    if let Some(description) = row.get_mut("description") {
        if !description.is_empty() {
            *description = normalize_description(description);
        }
    }
}

/// Trim whitespace and treat the literal `NULL` as missing.
pub fn prepare_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Strip grouping spaces and turn a comma separator into a dot.
pub fn prepare_numeric(raw: &str) -> String {
    raw.replace(' ', "").replace(',', ".")
}

/// Keep only the date component of `YYYY-MM-DD[ HH:MM:SS]` values.
pub fn normalize_date(raw: &str) -> String {
    raw.split_whitespace().next().unwrap_or("").to_string()
}

/// Collapse `a | b | a` descriptions into deduplicated lines.
pub fn normalize_description(raw: &str) -> String {
    let mut seen = Vec::new();
    let mut parts = Vec::new();
    for part in raw.split('|') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let key = item.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        parts.push(item);
    }
    if parts.is_empty() {
        raw.trim().to_string()
    } else {
        parts.join("\n")
    }
}

/// Translate a partner label through `table`, falling back to the
/// uppercased raw value for labels the table does not know.
pub fn map_enum(value: &str, table: &[(&str, &str)]) -> String {
    if value.is_empty() {
        return String::new();
    }
    let key = fold_key(value);
    for (from, to) in table {
        if *from == key {
            return (*to).to_string();
        }
    }
    value.trim().to_uppercase()
}

fn map_field(row: &mut HashMap<String, String>, field: &str, table: &[(&str, &str)]) {
    if let Some(value) = row.get(field) {
        let mapped = map_enum(value, table);
        row.insert(field.to_string(), mapped);
    }
}

/// Like [`map_field`] but unknown labels become empty rather than
/// being passed through uppercased.
fn map_optional_field(row: &mut HashMap<String, String>, field: &str, table: &[(&str, &str)]) {
    if let Some(value) = row.get(field) {
        if value.is_empty() {
            return;
        }
        let key = fold_key(value);
        let mapped = table
            .iter()
            .find(|(from, _)| *from == key)
            .map(|(_, to)| (*to).to_string())
            .unwrap_or_default();
        row.insert(field.to_string(), mapped);
    }
}

fn numeric_field(row: &mut HashMap<String, String>, field: &str) {
    if let Some(value) = row.get(field) {
        let cleaned = prepare_numeric(value);
        row.insert(field.to_string(), cleaned);
    }
}

/// Lowercase, strip diacritics and drop everything that is not
/// alphanumeric, so `"Olej napędowy"` and `"olejnapedowy"` compare equal.
fn fold_key(value: &str) -> String {
    value
        .chars()
        .filter_map(|c| match c.to_lowercase().next().unwrap_or(c) {
            'ą' => Some('a'),
            'ć' => Some('c'),
            'ę' => Some('e'),
            'ł' => Some('l'),
            'ń' => Some('n'),
            'ó' => Some('o'),
            'ś' => Some('s'),
            'ź' | 'ż' => Some('z'),
            c if c.is_ascii_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

const CATEGORY_MAP: &[(&str, &str)] = &[("osobowy", "PASSENGER"), ("dostawczy", "DELIVERY")];

const FUEL_MAP: &[(&str, &str)] = &[
    ("benzyna", "PETROL"),
    ("etylina", "PETROL"),
    ("olejnapedowy", "DIESEL"),
    ("diesel", "DIESEL"),
    ("hybrydowy", "HYBRID"),
    ("hybrydapluginelektric", "HYBRID"),
    ("lpg", "LPG"),
    ("elektryczny", "ELECTRIC"),
];

const TRANSMISSION_MAP: &[(&str, &str)] = &[
    ("manualna", "MANUAL"),
    ("automatyczna", "AUTOMATIC"),
    ("automat", "AUTOMATIC"),
    ("automatycznahydraulicznaklasyczna", "AUTOMATIC"),
];

const DRIVE_WHEELS_MAP: &[(&str, &str)] = &[
    ("naprzedniekola", "FRONT"),
    ("naprzod", "FRONT"),
    ("fwd", "FRONT"),
    ("natylniekola", "REAR"),
    ("rwd", "REAR"),
    ("4x4", "FOUR"),
    ("4x4staly", "FOUR"),
    ("4x4automatyczny", "FOUR"),
    ("4wd", "FOUR"),
    ("awd", "FOUR"),
];

const BODY_TYPE_MAP: &[(&str, &str)] = &[
    ("suv", "SUV"),
    ("kombi", "ESTATE"),
    ("hatchback", "HATCHBACK"),
    ("van", "VAN"),
    ("sedan", "SALOON"),
    ("limuzyna", "SALOON"),
    ("autamiejskie", "HATCHBACK"),
    ("kompakt", "HATCHBACK"),
];

const CAR_CLASS_MAP: &[(&str, &str)] = &[
    ("business", "BUSINESS"),
    ("family", "FAMILY"),
    ("sweet", "SWEET"),
    ("adrenaline", "ADRENALINE"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_literal_becomes_empty() {
        assert_eq!(prepare_value("NULL"), "");
        assert_eq!(prepare_value("  null "), "");
        assert_eq!(prepare_value(" Golf "), "Golf");
    }

    #[test]
    fn comma_decimals_are_converted() {
        assert_eq!(prepare_numeric("12 500,50"), "12500.50");
        assert_eq!(prepare_numeric("1968"), "1968");
    }

    #[test]
    fn enum_translation_folds_diacritics() {
        assert_eq!(map_enum("Olej napędowy", FUEL_MAP), "DIESEL");
        assert_eq!(map_enum("BENZYNA", FUEL_MAP), "PETROL");
        // Unknown labels pass through uppercased.
        assert_eq!(map_enum("wodór", FUEL_MAP), "WODÓR");
    }

    #[test]
    fn timestamps_lose_time_component() {
        assert_eq!(normalize_date("2024-03-01 00:00:00"), "2024-03-01");
        assert_eq!(normalize_date("2024-03-01"), "2024-03-01");
    }

    #[test]
    fn descriptions_are_deduplicated() {
        assert_eq!(
            normalize_description("Klimatyzacja | Navi | klimatyzacja"),
            "Klimatyzacja\nNavi"
        );
    }

    #[test]
    fn clean_row_defaults_engine_code() {
        let mut row = HashMap::from([
            ("engineCode".to_string(), "NULL".to_string()),
            ("category".to_string(), "Osobowy".to_string()),
        ]);
        clean_row(&mut row);
        assert_eq!(row["engineCode"], "-");
        assert_eq!(row["category"], "PASSENGER");
    }
}
