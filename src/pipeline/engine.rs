//! Extraction engine: recognized text in, structured record out.
//!
//! A stateless sequence of independent passes over the same immutable text:
//! study date, patient identity, then two biomarker strategies merged under
//! an explicit precedence rule. Sparse or malformed text never fails — a
//! missed match is an unset field.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::catalog::{
    month_from_name, normalize_unit, BARE_RANGE_PATTERN, BIOMARKER_PATTERNS, DATE_KEYWORDS,
    DATE_OF_BIRTH_PATTERNS, DATE_PATTERNS, DOB_FORMATS, DateForm, FULL_NAME_PATTERNS,
    LABELED_RANGE_PATTERN, NUMBER_PATTERN, RECORD_NUMBER_PATTERNS,
};
use super::entities::EntityRecognizer;
use super::types::{
    BiomarkerKey, BiomarkerMeasurement, ExtractionResult, PatientInfo, RecognizedText,
};

/// Token window around an entity searched for a numeric value.
const VALUE_WINDOW: usize = 10;
/// Forward token window from the value searched for a unit.
const UNIT_WINDOW: usize = 5;
/// Forward token window from the value searched for a reference range.
const RANGE_WINDOW: usize = 20;

/// Stateless extraction engine.
///
/// The entity recognizer is a capability decided once at construction: when
/// absent (model unavailable), only the line-pattern strategy runs.
pub struct ExtractionEngine {
    entities: Option<Arc<dyn EntityRecognizer>>,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionEngine {
    pub fn new() -> Self {
        Self { entities: None }
    }

    pub fn with_entity_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        info!("entity-assisted biomarker strategy enabled");
        self.entities = Some(recognizer);
        self
    }

    /// Extract the structured record. Never fails; empty text yields an
    /// empty result object.
    pub fn extract(&self, text: &RecognizedText) -> ExtractionResult {
        let full_text = text.full_text();

        let study_date = extract_study_date(&text.lines);
        let patient = extract_patient_info(&full_text);

        // Strategy A (entity-assisted) outranks strategy B (line-pattern):
        // precedence reflects confidence ordering, not recency.
        let primary = match &self.entities {
            Some(ner) => extract_entity_assisted(ner.as_ref(), &full_text),
            None => BTreeMap::new(),
        };
        let fallback = extract_line_patterns(&text.lines);
        let mut biomarkers = merge_strategies(primary, fallback);

        for measurement in biomarkers.values_mut() {
            apply_abnormality(measurement);
        }

        debug!(
            biomarkers = biomarkers.len(),
            has_date = study_date.is_some(),
            "extraction complete"
        );

        ExtractionResult {
            biomarkers,
            study_date,
            patient,
        }
    }
}

// ── Study date ────────────────────────────────────────────────────────────

/// Line-order scan against the date catalog; a keyword-restricted second
/// pass runs only when the unrestricted pass found nothing.
fn extract_study_date(lines: &[String]) -> Option<NaiveDate> {
    if let Some(date) = scan_lines_for_date(lines.iter()) {
        return Some(date);
    }
    scan_lines_for_date(lines.iter().filter(|line| {
        let lower = line.to_lowercase();
        DATE_KEYWORDS.iter().any(|k| lower.contains(k))
    }))
}

fn scan_lines_for_date<'a>(lines: impl Iterator<Item = &'a String>) -> Option<NaiveDate> {
    for line in lines {
        for (form, pattern) in DATE_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };
            if let Some(date) = parse_date_capture(*form, &caps) {
                return Some(date);
            }
            // Calendar-invalid match: keep scanning.
        }
    }
    None
}

fn parse_date_capture(form: DateForm, caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let int = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
    let (day, month, year) = match form {
        DateForm::DayMonthYear4 => (int(1)?, int(2)?, int(3)?),
        DateForm::YearMonthDay => (int(3)?, int(2)?, int(1)?),
        DateForm::DayMonthYear2 => (int(1)?, int(2)?, resolve_two_digit_year(int(3)?)),
        DateForm::MonthNameRu | DateForm::MonthNameEn => {
            let month = month_from_name(caps.get(2)?.as_str())? as i32;
            (int(1)?, month, int(3)?)
        }
    };
    validate_date(day, month, year)
}

/// 2-digit years: >= 50 resolves to the 1900s, below to the 2000s.
fn resolve_two_digit_year(year: i32) -> i32 {
    if year < 50 {
        2000 + year
    } else {
        1900 + year
    }
}

fn validate_date(day: i32, month: i32, year: i32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) || !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

// ── Patient identity ──────────────────────────────────────────────────────

/// Each field resolves independently; the first matching pattern per field
/// wins and remaining patterns for that field are not tried.
fn extract_patient_info(text: &str) -> PatientInfo {
    let mut info = PatientInfo::default();

    for pattern in FULL_NAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            // Positional split: surname / given name / patronymic.
            let mut parts = caps[1].split_whitespace();
            info.surname = parts.next().map(str::to_string);
            info.given_name = parts.next().map(str::to_string);
            info.patronymic = parts.next().map(str::to_string);
            break;
        }
    }

    for pattern in RECORD_NUMBER_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            info.record_number = Some(caps[1].to_string());
            break;
        }
    }

    for pattern in DATE_OF_BIRTH_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            info.date_of_birth = parse_dob(&caps[1]);
            break;
        }
    }

    info
}

fn parse_dob(raw: &str) -> Option<NaiveDate> {
    DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// ── Strategy A: entity-assisted ───────────────────────────────────────────

/// Candidate entities are tested against every biomarker's name patterns;
/// on a hit, the surrounding token window supplies value, unit, and range.
fn extract_entity_assisted(
    ner: &dyn EntityRecognizer,
    text: &str,
) -> BTreeMap<BiomarkerKey, BiomarkerMeasurement> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut found = BTreeMap::new();

    for entity in ner.recognize(text) {
        for (key, patterns) in BIOMARKER_PATTERNS.iter() {
            if found.contains_key(key) {
                continue;
            }
            if patterns.iter().any(|p| p.is_match(&entity.text)) {
                if let Some(measurement) =
                    measurement_near(&tokens, entity.token_index, entity.token_len, *key)
                {
                    debug!(key = %key, entity = %entity.text, "entity-assisted match");
                    found.insert(*key, measurement);
                }
            }
        }
    }

    found
}

/// First numeric token within `VALUE_WINDOW` positions of the entity wins;
/// tokens after the entity are preferred over those before it, since lab
/// layouts put values to the right of the analyte name. The entity's own
/// tokens are never candidates — names like "Т4" or "HbA1c" carry digits.
fn measurement_near(
    tokens: &[&str],
    entity_index: usize,
    entity_len: usize,
    key: BiomarkerKey,
) -> Option<BiomarkerMeasurement> {
    let after = entity_index + entity_len;
    let forward = after..(after + VALUE_WINDOW).min(tokens.len());
    let backward = (entity_index.saturating_sub(VALUE_WINDOW - 1)..entity_index).rev();

    let value_index = forward
        .chain(backward)
        .find(|&i| parse_numeric_token(tokens[i]).is_some())?;
    let value = parse_numeric_token(tokens[value_index])?;

    let unit_window = tokens[value_index..(value_index + UNIT_WINDOW).min(tokens.len())].join(" ");
    let range_window =
        tokens[value_index..(value_index + RANGE_WINDOW).min(tokens.len())].join(" ");
    let range = parse_reference_range(&range_window);

    Some(BiomarkerMeasurement {
        name: key,
        value,
        unit: normalize_unit(&unit_window).map(str::to_string),
        reference_min: range.map(|(min, _)| min),
        reference_max: range.map(|(_, max)| max),
        is_abnormal: None,
    })
}

/// Parse a whitespace token as a number, tolerating surrounding punctuation
/// and a comma decimal separator. Tokens carrying any letter are not values
/// ("Т4", "HbA1c:", "mmol/L"), and compound tokens like "3.5-5.5" fail.
fn parse_numeric_token(token: &str) -> Option<f64> {
    if token.chars().any(char::is_alphabetic) {
        return None;
    }
    let cleaned = token
        .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .trim_end_matches(['.', ',']);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.replace(',', ".").parse().ok()
}

// ── Strategy B: line-pattern ──────────────────────────────────────────────

/// Per line × per biomarker pattern: first numeric substring on the line is
/// the value; unit and range are searched on the whole line. A key already
/// resolved on an earlier line is not overwritten.
fn extract_line_patterns(lines: &[String]) -> BTreeMap<BiomarkerKey, BiomarkerMeasurement> {
    let mut found = BTreeMap::new();

    for line in lines {
        for (key, patterns) in BIOMARKER_PATTERNS.iter() {
            if found.contains_key(key) {
                continue;
            }
            if !patterns.iter().any(|p| p.is_match(line)) {
                continue;
            }
            let Some(value) = NUMBER_PATTERN
                .captures(line)
                .and_then(|caps| caps[1].replace(',', ".").parse::<f64>().ok())
            else {
                continue;
            };
            let range = parse_reference_range(line);
            found.insert(
                *key,
                BiomarkerMeasurement {
                    name: *key,
                    value,
                    unit: normalize_unit(line).map(str::to_string),
                    reference_min: range.map(|(min, _)| min),
                    reference_max: range.map(|(_, max)| max),
                    is_abnormal: None,
                },
            );
        }
    }

    found
}

// ── Merge and shared helpers ──────────────────────────────────────────────

/// Strategy A outranks strategy B: B supplies a key only if A produced none
/// for it. A resolved key is never overwritten.
fn merge_strategies(
    primary: BTreeMap<BiomarkerKey, BiomarkerMeasurement>,
    fallback: BTreeMap<BiomarkerKey, BiomarkerMeasurement>,
) -> BTreeMap<BiomarkerKey, BiomarkerMeasurement> {
    let mut merged = primary;
    for (key, measurement) in fallback {
        merged.entry(key).or_insert(measurement);
    }
    merged
}

/// Labeled form first, bare min–max pair second. Once a form matches, a
/// parse failure discards the candidate without falling through.
pub(crate) fn parse_reference_range(text: &str) -> Option<(f64, f64)> {
    let caps = LABELED_RANGE_PATTERN
        .captures(text)
        .or_else(|| BARE_RANGE_PATTERN.captures(text))?;
    let min = caps[1].replace(',', ".").parse().ok()?;
    let max = caps[2].replace(',', ".").parse().ok()?;
    Some((min, max))
}

fn apply_abnormality(measurement: &mut BiomarkerMeasurement) {
    if let (Some(min), Some(max)) = (measurement.reference_min, measurement.reference_max) {
        measurement.is_abnormal = Some(measurement.value < min || measurement.value > max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::entities::LexiconEntityRecognizer;

    fn engine_with_ner() -> ExtractionEngine {
        ExtractionEngine::new()
            .with_entity_recognizer(Arc::new(LexiconEntityRecognizer::bundled()))
    }

    fn text(s: &str) -> RecognizedText {
        RecognizedText::from_plain(s)
    }

    // ── Study date ────────────────────────────────────────────────────

    #[test]
    fn date_recovered_for_every_separator() {
        for sep in [".", "/", "-"] {
            let input = text(&format!("Анализ от 15{sep}03{sep}2025"));
            let result = ExtractionEngine::new().extract(&input);
            assert_eq!(
                result.study_date,
                NaiveDate::from_ymd_opt(2025, 3, 15),
                "separator {sep:?}"
            );
        }
    }

    #[test]
    fn year_month_day_form() {
        let result = ExtractionEngine::new().extract(&text("Study 2024-11-03 final"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2024, 11, 3));
    }

    #[test]
    fn two_digit_year_boundary_at_fifty() {
        let result = ExtractionEngine::new().extract(&text("от 15.03.25"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 15));

        let result = ExtractionEngine::new().extract(&text("от 15.03.82"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(1982, 3, 15));
    }

    #[test]
    fn month_name_dates_both_languages() {
        let result = ExtractionEngine::new().extract(&text("взято 7 марта 2025"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 7));

        let result = ExtractionEngine::new().extract(&text("Collected 7 March 2025"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 7));
    }

    #[test]
    fn out_of_range_components_rejected() {
        let result = ExtractionEngine::new().extract(&text("99.99.2025 and 15.13.2025"));
        assert!(result.study_date.is_none());
    }

    #[test]
    fn calendar_invalid_date_skipped_for_later_line() {
        // 31.02 passes the range check but not the calendar; scanning continues.
        let result = ExtractionEngine::new().extract(&text("31.02.2025\n15.03.2025"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 15));
    }

    #[test]
    fn first_validated_date_wins_in_line_order() {
        let result = ExtractionEngine::new().extract(&text("01.02.2024\n15.03.2025"));
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    // ── Patient identity ──────────────────────────────────────────────

    #[test]
    fn full_name_splits_positionally() {
        let result = ExtractionEngine::new()
            .extract(&text("Пациент: Иванов Иван Иванович\nГлюкоза 5.5"));
        assert_eq!(result.patient.surname.as_deref(), Some("Иванов"));
        assert_eq!(result.patient.given_name.as_deref(), Some("Иван"));
        assert_eq!(result.patient.patronymic.as_deref(), Some("Иванович"));
    }

    #[test]
    fn two_token_name_leaves_patronymic_unset() {
        let result = ExtractionEngine::new().extract(&text("Patient: John Smith"));
        assert_eq!(result.patient.surname.as_deref(), Some("John"));
        assert_eq!(result.patient.given_name.as_deref(), Some("Smith"));
        assert!(result.patient.patronymic.is_none());
    }

    #[test]
    fn record_number_and_dob() {
        let result = ExtractionEngine::new()
            .extract(&text("Карта № 123456\nДата рождения: 15.06.1985"));
        assert_eq!(result.patient.record_number.as_deref(), Some("123456"));
        assert_eq!(
            result.patient.date_of_birth,
            NaiveDate::from_ymd_opt(1985, 6, 15)
        );
    }

    #[test]
    fn dob_tries_all_numeric_formats() {
        for raw in ["15.06.1985", "15-06-1985", "15/06/1985"] {
            let date = parse_dob(raw);
            assert_eq!(date, NaiveDate::from_ymd_opt(1985, 6, 15), "format {raw:?}");
        }
        assert!(parse_dob("31.02.1985").is_none());
    }

    #[test]
    fn identity_fields_resolve_independently() {
        let result = ExtractionEngine::new().extract(&text("№ 777"));
        assert_eq!(result.patient.record_number.as_deref(), Some("777"));
        assert!(result.patient.surname.is_none());
        assert!(result.patient.date_of_birth.is_none());
    }

    // ── Reference range ───────────────────────────────────────────────

    #[test]
    fn range_round_trips_all_surface_forms() {
        for input in ["(ref: 3.5-5.5)", "[3.5-5.5]", "норма: 3.5-5.5"] {
            assert_eq!(
                parse_reference_range(input),
                Some((3.5, 5.5)),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn range_accepts_comma_decimals_and_dashes() {
        assert_eq!(parse_reference_range("референс 3,5–5,5"), Some((3.5, 5.5)));
        assert_eq!(parse_reference_range("3.5—5.5"), Some((3.5, 5.5)));
    }

    #[test]
    fn range_absent_when_no_pair() {
        assert_eq!(parse_reference_range("3.1 mmol/L"), None);
        assert_eq!(parse_reference_range("no numbers"), None);
    }

    // ── Abnormality invariant ─────────────────────────────────────────

    #[test]
    fn abnormality_tristate() {
        let mut high = BiomarkerMeasurement {
            name: BiomarkerKey::Glucose,
            value: 6.0,
            unit: None,
            reference_min: Some(3.5),
            reference_max: Some(5.5),
            is_abnormal: None,
        };
        apply_abnormality(&mut high);
        assert_eq!(high.is_abnormal, Some(true));

        let mut normal = BiomarkerMeasurement {
            value: 4.0,
            ..high.clone()
        };
        normal.is_abnormal = None;
        apply_abnormality(&mut normal);
        assert_eq!(normal.is_abnormal, Some(false));

        let mut unbounded = BiomarkerMeasurement {
            reference_min: None,
            reference_max: None,
            ..high.clone()
        };
        unbounded.is_abnormal = None;
        apply_abnormality(&mut unbounded);
        assert_eq!(unbounded.is_abnormal, None);
    }

    #[test]
    fn below_minimum_is_abnormal() {
        let result = ExtractionEngine::new()
            .extract(&text("Глюкоза 2.1 ммоль/л норма: 3.5-5.5"));
        let glucose = &result.biomarkers[&BiomarkerKey::Glucose];
        assert_eq!(glucose.is_abnormal, Some(true));
    }

    // ── Line-pattern strategy ─────────────────────────────────────────

    #[test]
    fn line_pattern_russian_report() {
        let input = text("Общий холестерин 6,2 ммоль/л (норма: 3,5-5,2)\nКреатинин 72 мкмоль/л");
        let result = ExtractionEngine::new().extract(&input);

        let chol = &result.biomarkers[&BiomarkerKey::TotalCholesterol];
        assert_eq!(chol.value, 6.2);
        assert_eq!(chol.unit.as_deref(), Some("mmol/l"));
        assert_eq!(chol.reference_min, Some(3.5));
        assert_eq!(chol.reference_max, Some(5.2));
        assert_eq!(chol.is_abnormal, Some(true));

        let crea = &result.biomarkers[&BiomarkerKey::Creatinine];
        assert_eq!(crea.value, 72.0);
        assert_eq!(crea.unit.as_deref(), Some("umol/l"));
        assert!(crea.is_abnormal.is_none());
    }

    #[test]
    fn first_line_wins_for_repeated_key() {
        let input = text("Глюкоза 5.5 ммоль/л\nГлюкоза 9.9 ммоль/л");
        let result = ExtractionEngine::new().extract(&input);
        assert_eq!(result.biomarkers[&BiomarkerKey::Glucose].value, 5.5);
    }

    #[test]
    fn line_without_number_is_ignored() {
        let input = text("Глюкоза — результат см. ниже");
        let result = ExtractionEngine::new().extract(&input);
        assert!(result.biomarkers.is_empty());
    }

    // ── Entity-assisted strategy and merge ────────────────────────────

    #[test]
    fn entity_assisted_finds_value_near_entity() {
        let input = text("Креатинин 72 мкмоль/л референс 62-106");
        let result = engine_with_ner().extract(&input);
        let crea = &result.biomarkers[&BiomarkerKey::Creatinine];
        assert_eq!(crea.value, 72.0);
        assert_eq!(crea.unit.as_deref(), Some("umol/l"));
        assert_eq!(crea.reference_min, Some(62.0));
        assert_eq!(crea.reference_max, Some(106.0));
        assert_eq!(crea.is_abnormal, Some(false));
    }

    #[test]
    fn merge_precedence_is_strategy_a_over_b() {
        struct FixedRecognizer;
        impl EntityRecognizer for FixedRecognizer {
            fn recognize(&self, _text: &str) -> Vec<crate::pipeline::entities::Entity> {
                // Entity at token 4 ("Глюкоза" on the second line)
                vec![crate::pipeline::entities::Entity {
                    text: "Глюкоза".to_string(),
                    token_index: 4,
                    token_len: 1,
                    category: crate::pipeline::entities::EntityCategory::Chemical,
                }]
            }
        }

        // Line strategy sees 4.4 first (line order); the entity points at the
        // second occurrence, so strategy A resolves 7.7 and must win.
        let input = text("Глюкоза 4.4 ммоль/л\nповтор: Глюкоза 7.7 ммоль/л");
        let engine =
            ExtractionEngine::new().with_entity_recognizer(Arc::new(FixedRecognizer));
        let result = engine.extract(&input);
        assert_eq!(result.biomarkers[&BiomarkerKey::Glucose].value, 7.7);
    }

    #[test]
    fn strategy_b_fills_keys_a_missed() {
        struct EmptyRecognizer;
        impl EntityRecognizer for EmptyRecognizer {
            fn recognize(&self, _text: &str) -> Vec<crate::pipeline::entities::Entity> {
                Vec::new()
            }
        }

        let input = text("Глюкоза 5.5 ммоль/л");
        let engine =
            ExtractionEngine::new().with_entity_recognizer(Arc::new(EmptyRecognizer));
        let result = engine.extract(&input);
        assert_eq!(result.biomarkers[&BiomarkerKey::Glucose].value, 5.5);
    }

    #[test]
    fn numeric_token_parsing() {
        assert_eq!(parse_numeric_token("5.2"), Some(5.2));
        assert_eq!(parse_numeric_token("5,2"), Some(5.2));
        assert_eq!(parse_numeric_token("(72)"), Some(72.0));
        assert_eq!(parse_numeric_token("5.2,"), Some(5.2));
        assert_eq!(parse_numeric_token("78.9."), Some(78.9));
        assert_eq!(parse_numeric_token("3.5-5.5"), None);
        assert_eq!(parse_numeric_token("15.03.2025"), None);
        assert_eq!(parse_numeric_token("mmol/L"), None);
        // Letter-bearing tokens are names, not values
        assert_eq!(parse_numeric_token("Т4"), None);
        assert_eq!(parse_numeric_token("HbA1c:"), None);
    }

    #[test]
    fn digit_bearing_analyte_names_are_not_values() {
        let result = engine_with_ner().extract(&text("Т4 78.9 пмоль/л"));
        let t4 = &result.biomarkers[&BiomarkerKey::T4];
        assert_eq!(t4.value, 78.9);
        assert_eq!(t4.unit.as_deref(), Some("pmol/l"));

        let result = engine_with_ner().extract(&text("HbA1c: 6.5 %"));
        let hba1c = &result.biomarkers[&BiomarkerKey::GlycatedHemoglobin];
        assert_eq!(hba1c.value, 6.5);
        assert_eq!(hba1c.unit.as_deref(), Some("%"));
    }

    #[test]
    fn value_followed_by_list_punctuation_is_kept() {
        let result = engine_with_ner().extract(&text("Креатинин 72, мкмоль/л"));
        assert_eq!(result.biomarkers[&BiomarkerKey::Creatinine].value, 72.0);
    }

    // ── End-to-end properties ─────────────────────────────────────────

    #[test]
    fn end_to_end_scenario() {
        let input = text(
            "Date: 15.03.2025\nTotal Cholesterol: 5.2 mmol/L (ref: 3.5-5.5)\nLDL-C: 3.1 mmol/L",
        );
        let result = engine_with_ner().extract(&input);

        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 15));

        let chol = &result.biomarkers[&BiomarkerKey::TotalCholesterol];
        assert_eq!(chol.value, 5.2);
        assert_eq!(chol.unit.as_deref(), Some("mmol/l"));
        assert_eq!(chol.reference_min, Some(3.5));
        assert_eq!(chol.reference_max, Some(5.5));
        assert_eq!(chol.is_abnormal, Some(false));

        let ldl = &result.biomarkers[&BiomarkerKey::LdlC];
        assert_eq!(ldl.value, 3.1);
        assert_eq!(ldl.unit.as_deref(), Some("mmol/l"));
        assert!(ldl.reference_min.is_none());
        assert!(ldl.reference_max.is_none());
        assert!(ldl.is_abnormal.is_none());
    }

    #[test]
    fn end_to_end_without_entity_recognizer() {
        // Line-pattern strategy alone must still produce the full record.
        let input = text(
            "Date: 15.03.2025\nTotal Cholesterol: 5.2 mmol/L (ref: 3.5-5.5)\nLDL-C: 3.1 mmol/L",
        );
        let result = ExtractionEngine::new().extract(&input);
        assert_eq!(result.study_date, NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(result.biomarkers[&BiomarkerKey::TotalCholesterol].value, 5.2);
        assert_eq!(result.biomarkers[&BiomarkerKey::LdlC].value, 3.1);
    }

    #[test]
    fn degenerate_empty_text_yields_empty_result() {
        let result = engine_with_ner().extract(&RecognizedText::default());
        assert!(result.biomarkers.is_empty());
        assert!(result.study_date.is_none());
        assert_eq!(result.patient, PatientInfo::default());
    }
}
