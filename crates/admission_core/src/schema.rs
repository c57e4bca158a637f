//! Schema registry for hospital admission observations.
//!
//! The registry is pure data: which field names are recognized, which are
//! mandatory, the closed domain of every categorical field, and the numeric
//! kind and inclusive range of every numeric field. It is built once at
//! startup and shared read-only (`Arc<SchemaRegistry>`) by the validator and
//! the classification pipeline.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const OBSERVATION_ID: &str = "observation_id";
pub const ZIP_CODE: &str = "Zip Code - 3 digits";
pub const BIRTH_WEIGHT: &str = "Birth Weight";

static ZIP_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{3}|OOS)$").expect("zip code pattern is valid"));

const HEALTH_SERVICE_AREAS: &[&str] = &[
    "Western NY",
    "Finger Lakes",
    "Southern Tier",
    "Central NY",
    "Capital/Adiron",
    "Hudson Valley",
    "New York City",
    "Long Island",
];

const AGE_GROUPS: &[&str] = &["0 to 17", "18 to 29", "30 to 49", "50 to 69", "70 or Older"];

const GENDERS: &[&str] = &["F", "M"];

const RACES: &[&str] = &["White", "Other Race", "Black/African American", "Multi-racial"];

const ETHNICITIES: &[&str] = &[
    "Not Span/Hispanic",
    "Unknown",
    "Spanish/Hispanic",
    "Multi-ethnic",
];

const ADMISSION_TYPES: &[&str] = &[
    "Emergency",
    "Elective",
    "Urgent",
    "Newborn",
    "Not Available",
    "Trauma",
];

const SEVERITIES: &[&str] = &["Minor", "Moderate", "Major", "Extreme"];

const MEDICAL_SURGICAL: &[&str] = &["Medical", "Surgical", "Not Applicable"];

const PAYMENT_TYPOLOGIES: &[&str] = &[
    "Medicaid",
    "Medicare",
    "Blue Cross/Blue Shield",
    "Private Health Insurance",
    "Self-Pay",
    "Managed Care, Unspecified",
    "Federal/State/Local/VA",
    "Miscellaneous/Other",
    "Department of Corrections",
    "Unknown",
];

const YES_NO: &[&str] = &["Y", "N"];

/// Numeric target kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

impl NumericKind {
    /// Article + noun used in coercion failure messages.
    pub fn expected(&self) -> &'static str {
        match self {
            NumericKind::Integer => "an integer",
            NumericKind::Float => "a number",
        }
    }
}

/// Inclusive numeric range. An open bound is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub const fn non_negative() -> Self {
        Self {
            min: Some(0.0),
            max: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Word used when a value falls outside the range.
    pub fn violation_reason(&self) -> &'static str {
        match (self.min, self.max) {
            (Some(min), None) if min == 0.0 => "negative",
            _ => "invalid",
        }
    }
}

/// What a field holds and how it is checked.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Categorical(&'static [&'static str]),
    Numeric {
        kind: NumericKind,
        range: NumericRange,
    },
    /// Three digits or the out-of-state marker `OOS`.
    ZipCode,
    String,
}

/// One recognized observation field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    /// Substituted when an optional numeric field is absent.
    pub default: Option<i64>,
}

impl FieldSpec {
    pub const fn categorical(
        name: &'static str,
        required: bool,
        domain: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            required,
            kind: FieldKind::Categorical(domain),
            default: None,
        }
    }

    pub const fn integer(name: &'static str, required: bool, range: NumericRange) -> Self {
        Self {
            name,
            required,
            kind: FieldKind::Numeric {
                kind: NumericKind::Integer,
                range,
            },
            default: None,
        }
    }

    pub const fn float(name: &'static str, required: bool, range: NumericRange) -> Self {
        Self {
            name,
            required,
            kind: FieldKind::Numeric {
                kind: NumericKind::Float,
                range,
            },
            default: None,
        }
    }

    pub const fn string(name: &'static str, required: bool) -> Self {
        Self {
            name,
            required,
            kind: FieldKind::String,
            default: None,
        }
    }

    pub fn with_default(mut self, default: i64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn domain(&self) -> Option<&'static [&'static str]> {
        match self.kind {
            FieldKind::Categorical(domain) => Some(domain),
            _ => None,
        }
    }

    pub fn numeric(&self) -> Option<(NumericKind, NumericRange)> {
        match self.kind {
            FieldKind::Numeric { kind, range } => Some((kind, range)),
            _ => None,
        }
    }
}

/// Immutable registry of every recognized field, in declaration order.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    fields: Vec<FieldSpec>,
    index: HashMap<&'static str, usize>,
}

impl SchemaRegistry {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name, i))
            .collect();
        Self { fields, index }
    }

    /// The SPARCS inpatient discharge schema served by `/predict`.
    pub fn standard() -> Self {
        let non_negative = NumericRange::non_negative();
        Self::new(vec![
            FieldSpec::categorical("Health Service Area", true, HEALTH_SERVICE_AREAS),
            FieldSpec::string("Hospital County", true),
            FieldSpec::integer("Operating Certificate Number", false, non_negative),
            FieldSpec::integer("Facility Id", true, non_negative),
            FieldSpec::string("Facility Name", false),
            FieldSpec::categorical("Age Group", true, AGE_GROUPS),
            FieldSpec {
                name: ZIP_CODE,
                required: true,
                kind: FieldKind::ZipCode,
                default: None,
            },
            FieldSpec::categorical("Gender", true, GENDERS),
            FieldSpec::categorical("Race", true, RACES),
            FieldSpec::categorical("Ethnicity", true, ETHNICITIES),
            FieldSpec::categorical("Type of Admission", true, ADMISSION_TYPES),
            FieldSpec::string("Patient Disposition", false),
            FieldSpec::integer(
                "CCS Diagnosis Code",
                true,
                NumericRange::between(1.0, 917.0),
            ),
            FieldSpec::string("CCS Diagnosis Description", false),
            FieldSpec::integer(
                "CCS Procedure Code",
                true,
                NumericRange::between(0.0, 999.0),
            ),
            FieldSpec::string("CCS Procedure Description", false),
            FieldSpec::integer("APR DRG Code", true, NumericRange::between(1.0, 956.0)),
            FieldSpec::string("APR DRG Description", false),
            FieldSpec::integer("APR MDC Code", true, NumericRange::between(0.0, 25.0)),
            FieldSpec::string("APR MDC Description", false),
            FieldSpec::integer(
                "APR Severity of Illness Code",
                true,
                NumericRange::between(1.0, 4.0),
            ),
            FieldSpec::categorical("APR Severity of Illness Description", true, SEVERITIES),
            FieldSpec::categorical("APR Risk of Mortality", true, SEVERITIES),
            FieldSpec::categorical("APR Medical Surgical Description", true, MEDICAL_SURGICAL),
            FieldSpec::categorical("Payment Typology 1", true, PAYMENT_TYPOLOGIES),
            FieldSpec::categorical("Payment Typology 2", false, PAYMENT_TYPOLOGIES),
            FieldSpec::categorical("Payment Typology 3", false, PAYMENT_TYPOLOGIES),
            FieldSpec::integer("Attending Provider License Number", false, non_negative),
            FieldSpec::integer("Operating Provider License Number", false, non_negative),
            FieldSpec::integer("Other Provider License Number", false, non_negative),
            FieldSpec::integer(BIRTH_WEIGHT, false, non_negative).with_default(0),
            FieldSpec::categorical("Abortion Edit Indicator", true, YES_NO),
            FieldSpec::categorical("Emergency Department Indicator", true, YES_NO),
        ])
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn is_recognized(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn mandatory_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = (&FieldSpec, &'static [&'static str])> {
        self.fields
            .iter()
            .filter_map(|f| f.domain().map(|domain| (f, domain)))
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = (&FieldSpec, NumericKind, NumericRange)> {
        self.fields
            .iter()
            .filter_map(|f| f.numeric().map(|(kind, range)| (f, kind, range)))
    }

    pub fn zip_code_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::ZipCode))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// `true` for exactly three ASCII digits or `OOS`.
pub fn is_valid_zip_code(value: &str) -> bool {
    ZIP_CODE_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schema_shape() {
        let schema = SchemaRegistry::standard();
        assert_eq!(schema.fields().len(), 33);
        assert_eq!(schema.mandatory_fields().count(), 20);
        assert!(schema.is_recognized("Gender"));
        assert!(!schema.is_recognized(OBSERVATION_ID));
        assert!(!schema.is_recognized("gender"));
    }

    #[test]
    fn birth_weight_is_the_only_defaulted_field() {
        let schema = SchemaRegistry::standard();
        let defaulted: Vec<_> = schema
            .fields()
            .iter()
            .filter(|f| f.default.is_some())
            .map(|f| f.name)
            .collect();
        assert_eq!(defaulted, vec![BIRTH_WEIGHT]);
        assert!(!schema.field(BIRTH_WEIGHT).unwrap().required);
    }

    #[test]
    fn categorical_domains_are_verbatim() {
        let schema = SchemaRegistry::standard();
        assert_eq!(schema.field("Gender").unwrap().domain(), Some(GENDERS));
        assert_eq!(
            schema.field("Age Group").unwrap().domain().unwrap(),
            &["0 to 17", "18 to 29", "30 to 49", "50 to 69", "70 or Older"]
        );
        assert_eq!(
            schema
                .field("Emergency Department Indicator")
                .unwrap()
                .domain()
                .unwrap(),
            &["Y", "N"]
        );
        assert_eq!(schema.field(ZIP_CODE).unwrap().domain(), None);
    }

    #[test]
    fn numeric_ranges() {
        let schema = SchemaRegistry::standard();
        let (kind, range) = schema.field("CCS Diagnosis Code").unwrap().numeric().unwrap();
        assert_eq!(kind, NumericKind::Integer);
        assert!(range.contains(1.0) && range.contains(917.0));
        assert!(!range.contains(0.0) && !range.contains(918.0));
        assert_eq!(range.violation_reason(), "invalid");

        let (_, facility) = schema.field("Facility Id").unwrap().numeric().unwrap();
        assert!(facility.contains(0.0) && facility.contains(1e9));
        assert!(!facility.contains(-1.0));
        assert_eq!(facility.violation_reason(), "negative");
    }

    #[test]
    fn zip_code_pattern() {
        assert!(is_valid_zip_code("100"));
        assert!(is_valid_zip_code("OOS"));
        assert!(!is_valid_zip_code("10"));
        assert!(!is_valid_zip_code("1000"));
        assert!(!is_valid_zip_code("oos"));
        assert!(!is_valid_zip_code("100 "));
        // Unicode decimal digits are not zip digits.
        assert!(!is_valid_zip_code("\u{661}\u{660}\u{660}"));
        assert!(!is_valid_zip_code("\u{ff11}\u{ff10}\u{ff10}"));
    }
}
