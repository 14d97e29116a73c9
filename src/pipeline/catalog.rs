//! Static bilingual pattern catalog: pure data, no engine logic.
//!
//! Every table is a `LazyLock` of compiled case-insensitive regexes covering
//! Russian and English surface forms plus common abbreviations. Short
//! abbreviations are word-boundary-anchored so they cannot fire inside
//! unrelated words.

use std::sync::LazyLock;

use regex::Regex;

use super::types::BiomarkerKey;

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static catalog pattern")
}

/// Name patterns per biomarker key, in catalog order.
pub static BIOMARKER_PATTERNS: LazyLock<Vec<(BiomarkerKey, Vec<Regex>)>> = LazyLock::new(|| {
    use BiomarkerKey::*;
    vec![
        (
            TotalCholesterol,
            vec![
                rx(r"(?i)общий\s+холестерин"),
                rx(r"(?i)total\s+cholesterol"),
                rx(r"(?i)холестерин\s+общий"),
            ],
        ),
        (
            LdlC,
            vec![
                rx(r"(?i)\bлпнп\b"),
                rx(r"(?i)\bldl[-\s]c\b"),
                rx(r"(?i)холестерин\s+лпнп"),
                rx(r"(?i)ldl\s+cholesterol"),
            ],
        ),
        (
            HdlC,
            vec![
                rx(r"(?i)\bлпвп\b"),
                rx(r"(?i)\bhdl[-\s]c\b"),
                rx(r"(?i)холестерин\s+лпвп"),
                rx(r"(?i)hdl\s+cholesterol"),
            ],
        ),
        (
            Triglycerides,
            vec![
                rx(r"(?i)триглицериды"),
                rx(r"(?i)triglycerides"),
                rx(r"(?i)\bтг\b"),
                rx(r"(?i)\btg\b"),
            ],
        ),
        (Creatinine, vec![rx(r"(?i)креатинин"), rx(r"(?i)creatinine")]),
        (Urea, vec![rx(r"(?i)мочевина"), rx(r"(?i)\burea\b")]),
        (
            UricAcid,
            vec![rx(r"(?i)мочевая\s+кислота"), rx(r"(?i)uric\s+acid")],
        ),
        (
            Alt,
            vec![
                rx(r"(?i)\bалт\b"),
                rx(r"(?i)\balt\b"),
                rx(r"(?i)аланинаминотрансфераза"),
                rx(r"(?i)alanine\s+aminotransferase"),
            ],
        ),
        (
            Ast,
            vec![
                rx(r"(?i)\bаст\b"),
                rx(r"(?i)\bast\b"),
                rx(r"(?i)аспартатаминотрансфераза"),
                rx(r"(?i)aspartate\s+aminotransferase"),
            ],
        ),
        (
            Crp,
            vec![
                rx(r"(?i)\bсрб\b"),
                rx(r"(?i)c-реактивный\s+белок"),
                rx(r"(?i)\bcrp\b"),
                rx(r"(?i)c-reactive\s+protein"),
            ],
        ),
        (
            TotalBilirubin,
            vec![
                rx(r"(?i)общий\s+билирубин"),
                rx(r"(?i)билирубин\s+общий"),
                rx(r"(?i)total\s+bilirubin"),
            ],
        ),
        (
            Potassium,
            vec![
                rx(r"(?i)\bкалий\b"),
                rx(r"(?i)potassium"),
                rx(r"(?i)\bk\b\+?"),
            ],
        ),
        (
            Sodium,
            vec![
                rx(r"(?i)\bнатрий\b"),
                rx(r"(?i)sodium"),
                rx(r"(?i)\bna\b\+?"),
            ],
        ),
        (Glucose, vec![rx(r"(?i)глюкоза"), rx(r"(?i)glucose")]),
        (
            GlycatedHemoglobin,
            vec![
                rx(r"(?i)гликированн?ый\s+гемоглобин"),
                rx(r"(?i)glycated\s+h(?:ae|e)moglobin"),
                rx(r"(?i)\bhba1c\b"),
            ],
        ),
        (
            Tsh,
            vec![
                rx(r"(?i)\bттг\b"),
                rx(r"(?i)тиреотропный\s+гормон"),
                rx(r"(?i)\btsh\b"),
                rx(r"(?i)thyroid[-\s]stimulating\s+hormone"),
            ],
        ),
        (
            T4,
            vec![
                rx(r"(?i)\bт4\b"),
                rx(r"(?i)тироксин"),
                rx(r"(?i)\bt4\b"),
                rx(r"(?i)thyroxine"),
            ],
        ),
    ]
});

/// Unit variants mapped onto the canonical unit set.
pub static UNIT_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        ("mmol/mol", vec![rx(r"(?i)ммоль/моль"), rx(r"(?i)mmol/mol")]),
        ("mmol/l", vec![rx(r"(?i)ммоль/л"), rx(r"(?i)mmol/l")]),
        ("mg/dl", vec![rx(r"(?i)мг/дл"), rx(r"(?i)mg/dl")]),
        ("umol/l", vec![rx(r"(?i)мкмоль/л"), rx(r"(?i)umol/l"), rx(r"(?i)µmol/l")]),
        ("g/l", vec![rx(r"(?i)\bг/л"), rx(r"(?i)\bg/l")]),
        ("u/l", vec![rx(r"(?i)ед\.?/л"), rx(r"(?i)\bu/l")]),
        ("miu/l", vec![rx(r"(?i)мме/л"), rx(r"(?i)miu/l")]),
        ("pmol/l", vec![rx(r"(?i)пмоль/л"), rx(r"(?i)pmol/l")]),
        ("%", vec![rx(r"%")]),
    ]
});

/// Map a text fragment onto the canonical unit set. First catalog hit wins.
pub fn normalize_unit(text: &str) -> Option<&'static str> {
    for (canonical, patterns) in UNIT_PATTERNS.iter() {
        if patterns.iter().any(|p| p.is_match(text)) {
            return Some(canonical);
        }
    }
    None
}

/// Numeric-form and month-name date patterns.
///
/// Order matters: 4-digit-year forms are tried before the 2-digit form so
/// `15.03.2025` is not truncated to `15.03.20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateForm {
    /// DD sep MM sep YYYY
    DayMonthYear4,
    /// YYYY sep MM sep DD
    YearMonthDay,
    /// DD sep MM sep YY
    DayMonthYear2,
    /// "D MonthName YYYY", Russian month names
    MonthNameRu,
    /// "D MonthName YYYY", English month names
    MonthNameEn,
}

pub static DATE_PATTERNS: LazyLock<Vec<(DateForm, Regex)>> = LazyLock::new(|| {
    vec![
        (
            DateForm::DayMonthYear4,
            rx(r"\b(\d{2})[./-](\d{2})[./-](\d{4})\b"),
        ),
        (
            DateForm::YearMonthDay,
            rx(r"\b(\d{4})[./-](\d{2})[./-](\d{2})\b"),
        ),
        (
            DateForm::DayMonthYear2,
            rx(r"\b(\d{2})[./-](\d{2})[./-](\d{2})\b"),
        ),
        (
            DateForm::MonthNameRu,
            rx(r"(?i)\b(\d{1,2})\s+(января|янв|февраля|фев|марта|мар|апреля|апр|мая|июня|июн|июля|июл|августа|авг|сентября|сен|октября|окт|ноября|ноя|декабря|дек)\.?\s+(\d{4})\b"),
        ),
        (
            DateForm::MonthNameEn,
            rx(r"(?i)\b(\d{1,2})\s+(january|jan|february|feb|march|mar|april|apr|may|june|jun|july|jul|august|aug|september|sep|october|oct|november|nov|december|dec)\.?\s+(\d{4})\b"),
        ),
    ]
});

/// Month number from a captured month-name alternative (either language).
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    // Longest prefixes first: "мар" before "ма" is irrelevant here because
    // every alternative is at least three characters.
    let month = match &lower[..] {
        s if s.starts_with("янв") || s.starts_with("jan") => 1,
        s if s.starts_with("фев") || s.starts_with("feb") => 2,
        s if s.starts_with("мар") || s.starts_with("mar") => 3,
        s if s.starts_with("апр") || s.starts_with("apr") => 4,
        s if s.starts_with("ма") || s.starts_with("may") => 5,
        s if s.starts_with("июн") || s.starts_with("jun") => 6,
        s if s.starts_with("июл") || s.starts_with("jul") => 7,
        s if s.starts_with("авг") || s.starts_with("aug") => 8,
        s if s.starts_with("сен") || s.starts_with("sep") => 9,
        s if s.starts_with("окт") || s.starts_with("oct") => 10,
        s if s.starts_with("ноя") || s.starts_with("nov") => 11,
        s if s.starts_with("дек") || s.starts_with("dec") => 12,
        _ => return None,
    };
    Some(month)
}

/// Lines containing one of these are re-scanned in the keyword date pass.
pub const DATE_KEYWORDS: &[&str] = &["дата", "date", "от", "from"];

/// Full-name label patterns; capture group 1 is the name.
pub static FULL_NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        rx(r"(?i)пациент:?\s*([А-Яа-яЁё]+\s+[А-Яа-яЁё]+(?:\s+[А-Яа-яЁё]+)?)"),
        rx(r"(?i)patient:?\s*([A-Za-z]+\s+[A-Za-z]+(?:\s+[A-Za-z]+)?)"),
        rx(r"(?i)ф\.?и\.?о\.?:?\s*([А-Яа-яЁё]+\s+[А-Яа-яЁё]+(?:\s+[А-Яа-яЁё]+)?)"),
        rx(r"(?i)name:?\s*([A-Za-z]+\s+[A-Za-z]+(?:\s+[A-Za-z]+)?)"),
    ]
});

/// Record-number label patterns; capture group 1 is the numeric sequence.
pub static RECORD_NUMBER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        rx(r"(?i)(?:номер|карты|карта|№)\s*:?\s*(\d+)"),
        rx(r"(?i)(?:number|card|id|#)\s*:?\s*(\d+)"),
    ]
});

/// Date-of-birth label patterns; capture group 1 is the raw date string.
pub static DATE_OF_BIRTH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        rx(r"(?i)(?:дата\s+рождения|д\.\s?р\.)\s*:?\s*(\d{1,2}[./-]\d{1,2}[./-]\d{2,4})"),
        rx(r"(?i)(?:date\s+of\s+birth|dob|birth\s+date)\s*:?\s*(\d{1,2}[./-]\d{1,2}[./-]\d{2,4})"),
    ]
});

/// Numeric formats tried, in order, when parsing a matched birth date.
pub const DOB_FORMATS: &[&str] = &[
    "%d.%m.%Y", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%y", "%d-%m-%y", "%d/%m/%y",
];

/// Labeled reference range: "референс"/"норма"/"norm"/"ref"/"reference"
/// followed by a min–max pair.
pub static LABELED_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)(?:референс|норма|norm|ref|reference)[^0-9]*(\d+[.,]?\d*)\s*[-–—]\s*(\d+[.,]?\d*)")
});

/// Bare min–max pair, bracketed or not; hyphen, en-dash, or em-dash.
pub static BARE_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"[(\[{]?\s*(\d+[.,]?\d*)\s*[-–—]\s*(\d+[.,]?\d*)\s*[)\]}]?")
});

/// First numeric substring on a line; comma accepted as decimal separator.
pub static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| rx(r"(\d+[.,]?\d*)"));
