//! Property tests for the observation validator against the standard schema.
//!
//! Run with: cargo test -p admission_core --test validator_properties

use std::sync::Arc;

use admission_core::schema::{FieldKind, OBSERVATION_ID};
use admission_core::{AdmissionError, RawObservation, SchemaRegistry, Validator};
use proptest::prelude::*;
use serde_json::{json, Value};

fn validator() -> Validator {
    Validator::new(Arc::new(SchemaRegistry::standard()))
}

fn valid_payload() -> RawObservation {
    let value = json!({
        "observation_id": "p1",
        "Health Service Area": "Hudson Valley",
        "Hospital County": "Westchester",
        "Facility Id": 1139,
        "Age Group": "70 or Older",
        "Zip Code - 3 digits": "105",
        "Gender": "F",
        "Race": "Other Race",
        "Ethnicity": "Spanish/Hispanic",
        "Type of Admission": "Urgent",
        "CCS Diagnosis Code": 2,
        "CCS Procedure Code": 999,
        "APR DRG Code": 720,
        "APR MDC Code": 18,
        "APR Severity of Illness Code": 4,
        "APR Severity of Illness Description": "Extreme",
        "APR Risk of Mortality": "Extreme",
        "APR Medical Surgical Description": "Medical",
        "Payment Typology 1": "Medicare",
        "Payment Typology 2": "Medicaid",
        "Birth Weight": 0,
        "Abortion Edit Indicator": "N",
        "Emergency Department Indicator": "N"
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn categorical_fields() -> Vec<(&'static str, &'static [&'static str])> {
    SchemaRegistry::standard()
        .categorical_fields()
        .map(|(f, domain)| (f.name, domain))
        .collect()
}

fn mandatory_fields() -> Vec<&'static str> {
    SchemaRegistry::standard()
        .mandatory_fields()
        .map(|f| f.name)
        .collect()
}

/// Integer fields with both bounds set.
fn ranged_fields() -> Vec<(&'static str, i64, i64)> {
    SchemaRegistry::standard()
        .numeric_fields()
        .filter_map(|(f, _, range)| match (range.min, range.max) {
            (Some(min), Some(max)) => Some((f.name, min as i64, max as i64)),
            _ => None,
        })
        .collect()
}

#[test]
fn baseline_payload_is_valid() {
    let validated = validator().validate(valid_payload()).unwrap();
    for name in mandatory_fields() {
        assert!(validated.fields.contains_key(name), "{name} dropped");
    }
    // Every numeric field comes back as a JSON integer.
    let schema = SchemaRegistry::standard();
    for (field, _, _) in schema.numeric_fields() {
        if let Some(v) = validated.get(field.name) {
            assert!(v.is_i64(), "{} not coerced: {v}", field.name);
        }
    }
}

#[test]
fn zip_code_is_the_only_pattern_field() {
    let schema = SchemaRegistry::standard();
    let zips: Vec<_> = schema
        .fields()
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::ZipCode))
        .map(|f| f.name)
        .collect();
    assert_eq!(zips, vec!["Zip Code - 3 digits"]);
}

proptest! {
    #[test]
    fn every_domain_value_passes(
        (field, value) in prop::sample::select(categorical_fields())
            .prop_flat_map(|(field, domain)| (Just(field), prop::sample::select(domain.to_vec())))
    ) {
        let mut raw = valid_payload();
        raw.insert(field.to_string(), json!(value));
        prop_assert!(validator().validate(raw).is_ok());
    }

    #[test]
    fn values_outside_domain_fail(
        (field, domain) in prop::sample::select(categorical_fields()),
        value in "[a-zA-Z0-9 /]{0,24}",
    ) {
        prop_assume!(!domain.contains(&value.as_str()));
        let mut raw = valid_payload();
        raw.insert(field.to_string(), json!(value));
        let err = validator().validate(raw).unwrap_err();
        let is_categorical = matches!(
            err.error,
            AdmissionError::InvalidCategoricalValue { field: ref f, .. } if f == field
        );
        prop_assert!(is_categorical);
    }

    #[test]
    fn missing_mandatory_field_is_named(field in prop::sample::select(mandatory_fields())) {
        let mut raw = valid_payload();
        raw.remove(field);
        let err = validator().validate(raw).unwrap_err();
        prop_assert_eq!(err.observation_id.as_deref(), Some("p1"));
        prop_assert_eq!(err.to_string(), format!("{field} is missing."));
    }

    #[test]
    fn unrecognized_key_is_named(key in "[A-Za-z][A-Za-z ]{0,30}") {
        prop_assume!(!SchemaRegistry::standard().is_recognized(&key) && key != OBSERVATION_ID);
        let mut raw = valid_payload();
        raw.insert(key.clone(), json!("anything"));
        let err = validator().validate(raw).unwrap_err();
        prop_assert_eq!(err.to_string(), format!("{key} is not a valid feature."));
    }

    #[test]
    fn numeric_range_is_inclusive(
        ((field, min, max), offset) in (prop::sample::select(ranged_fields()), 0i64..2000)
    ) {
        let mut raw = valid_payload();
        let candidate = min - 1000 + offset;
        raw.insert(field.to_string(), json!(candidate.to_string()));
        let result = validator().validate(raw);
        if (min..=max).contains(&candidate) {
            let validated = result.unwrap();
            prop_assert_eq!(validated.get(field).cloned(), Some(json!(candidate)));
        } else {
            prop_assert_eq!(result.unwrap_err().to_string(), format!("{field} is invalid."));
        }
    }

    #[test]
    fn negative_non_negative_fields_fail(value in i64::MIN / 2..0) {
        let mut raw = valid_payload();
        raw.insert("Facility Id".into(), json!(value));
        let err = validator().validate(raw).unwrap_err();
        prop_assert_eq!(err.to_string(), "Facility Id is negative.");
    }
}
