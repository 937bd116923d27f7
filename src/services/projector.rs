use serde_json::Value;

use crate::models::report::{
    AnalysisReport, ConfidenceBand, ConfidenceInfo, Finding, ImageQuality, PatientMetadata,
    PriorityInfo, SimilarCase, SimilarCases,
};

/// Label used when the server omitted or mangled one.
const PLACEHOLDER_LABEL: &str = "Unknown";

/// Shaping parameters for the findings list.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// How many leading findings are listed individually.
    pub top_findings: usize,
    /// Remainder mass (percentage points) at or below which the aggregated
    /// "other findings" bucket is suppressed.
    pub remainder_epsilon: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            top_findings: 3,
            remainder_epsilon: 1.0,
        }
    }
}

/// Project a raw result payload into a display-ready report.
///
/// Total over arbitrary JSON: every absent or wrong-typed field collapses to
/// its documented default (numbers to 0, strings to a placeholder,
/// collections to empty, substructures to `None`). Never panics.
pub fn project(raw: &Value, config: &ProjectorConfig) -> AnalysisReport {
    let mut findings = parse_findings(raw.get("specific"));
    findings.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_findings: Vec<Finding> = findings.iter().take(config.top_findings).cloned().collect();
    let top_sum: f64 = top_findings.iter().map(|f| f.probability).sum();
    let remainder = (100.0 - top_sum).max(0.0);
    let other_findings = (remainder > config.remainder_epsilon).then_some(remainder);

    AnalysisReport {
        domain: parse_finding(raw.get("domain")),
        findings,
        top_findings,
        other_findings,
        image_quality: parse_image_quality(raw.get("image_quality")),
        confidence: parse_confidence(raw.get("confidence")),
        priority: parse_priority(raw.get("priority")),
        similar_cases: parse_similar_cases(raw.get("similar_cases")),
        report_text: raw
            .get("report")
            .and_then(|r| r.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        heatmap: string_field(raw, "heatmap"),
        original_image: string_field(raw, "original_image"),
        patient_metadata: parse_patient_metadata(raw.get("patient_metadata")),
    }
}

/// Turn a server failure message into something a clinician can act on.
///
/// Empty messages get a generic fallback; the known preprocessing rejection
/// is rephrased; everything else is surfaced verbatim.
pub fn humanize_failure(error: Option<&str>) -> String {
    match error.map(str::trim) {
        None | Some("") => "The analysis failed on the server.".to_string(),
        Some(message) if message.contains("Unknown image format") => {
            "Unrecognized image format. Submit a valid DICOM or raster image.".to_string()
        }
        Some(message) => message.to_string(),
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Read a percentage-like number, clamped to the given range.
fn clamped_number(value: Option<&Value>, min: f64, max: f64) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0).clamp(min, max)
}

fn label_or_placeholder(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some(label) if !label.trim().is_empty() => label.to_string(),
        _ => PLACEHOLDER_LABEL.to_string(),
    }
}

fn parse_finding(value: Option<&Value>) -> Finding {
    Finding {
        label: label_or_placeholder(value.and_then(|v| v.get("label"))),
        probability: clamped_number(value.and_then(|v| v.get("probability")), 0.0, 100.0),
    }
}

fn parse_findings(value: Option<&Value>) -> Vec<Finding> {
    value
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(|e| parse_finding(Some(e))).collect())
        .unwrap_or_default()
}

fn parse_image_quality(value: Option<&Value>) -> Option<ImageQuality> {
    let section = value?.as_object()?;
    Some(ImageQuality {
        quality_level: label_or_placeholder(section.get("quality_level")).to_lowercase(),
        blur_score: clamped_number(section.get("blur_score"), 0.0, 1.0),
        contrast_score: clamped_number(section.get("contrast_score"), 0.0, 1.0),
        brightness_score: clamped_number(section.get("brightness_score"), 0.0, 1.0),
        recommendations: section
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn parse_confidence(value: Option<&Value>) -> Option<ConfidenceInfo> {
    let section = value?.as_object()?;
    let band = section
        .get("confidence_band")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ConfidenceBand>().ok())
        .unwrap_or(ConfidenceBand::Low);
    Some(ConfidenceInfo {
        confidence_band: band,
        uncertainty: clamped_number(section.get("uncertainty"), 0.0, 1.0),
        decision_margin: clamped_number(section.get("decision_margin"), 0.0, 100.0),
        confidence_message: section
            .get("confidence_message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn parse_priority(value: Option<&Value>) -> Option<PriorityInfo> {
    match value? {
        // Older service builds send the level as a bare string.
        Value::String(level) => Some(PriorityInfo {
            priority_level: level.clone(),
            priority_score: 0.0,
            recommended_action: String::new(),
            time_sensitivity: String::new(),
            specialty: String::new(),
        }),
        Value::Object(section) => Some(PriorityInfo {
            priority_level: section
                .get("priority_level")
                .and_then(Value::as_str)
                .unwrap_or("Normal")
                .to_string(),
            priority_score: clamped_number(section.get("priority_score"), 0.0, 10.0),
            recommended_action: section
                .get("recommended_action")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            time_sensitivity: section
                .get("time_sensitivity")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            specialty: section
                .get("specialty")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    }
}

fn parse_similar_cases(value: Option<&Value>) -> Option<SimilarCases> {
    let section = value?.as_object()?;
    let cases: Vec<SimilarCase> = section
        .get("similar_cases")
        .and_then(Value::as_array)?
        .iter()
        .map(|entry| SimilarCase {
            diagnosis: label_or_placeholder(entry.get("diagnosis")),
            similarity: clamped_number(entry.get("similarity"), 0.0, 100.0),
        })
        .collect();

    if cases.is_empty() {
        return None;
    }

    Some(SimilarCases {
        cases,
        cases_searched: section
            .get("cases_searched")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

fn parse_patient_metadata(value: Option<&Value>) -> Option<PatientMetadata> {
    let section = value?.as_object()?;

    // DICOM person names arrive as "LAST^FIRST".
    let raw_name = section
        .get("patient_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let (last_name, first_name) = match raw_name.split_once('^') {
        Some((last, first)) => (last.to_string(), first.to_string()),
        None => (raw_name.to_string(), String::new()),
    };

    let patient_id = section
        .get("patient_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty() && *id != "N/A")
        .map(str::to_string);

    // DICOM dates are "YYYYMMDD".
    let birth_date = section
        .get("birth_date")
        .and_then(Value::as_str)
        .filter(|d| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit()))
        .map(|d| format!("{}-{}-{}", &d[0..4], &d[4..6], &d[6..8]));

    Some(PatientMetadata {
        last_name,
        first_name,
        patient_id,
        birth_date,
    })
}
