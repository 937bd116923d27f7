use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One pathology (or domain) label with its probability in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    /// Clamped to 0–100 by the projector.
    pub probability: f64,
}

/// Image quality assessment attached to a result by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageQuality {
    pub quality_level: String,
    /// 0.0 (very blurry) to 1.0 (very sharp).
    pub blur_score: f64,
    pub contrast_score: f64,
    pub brightness_score: f64,
    pub recommendations: Vec<String>,
}

/// Qualitative confidence bucket reported alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

/// Calibrated confidence indicators for the top prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInfo {
    pub confidence_band: ConfidenceBand,
    /// 0.0 (certain) to 1.0 (completely uncertain).
    pub uncertainty: f64,
    /// Percentage-point gap between the top two predictions.
    pub decision_margin: f64,
    pub confidence_message: String,
}

impl ConfidenceInfo {
    /// Certainty in percent, as shown to clinicians.
    pub fn certainty(&self) -> f64 {
        ((1.0 - self.uncertainty) * 100.0).clamp(0.0, 100.0)
    }
}

/// Triage priority recommendation derived from the findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityInfo {
    pub priority_level: String,
    /// 0–10 severity scale.
    pub priority_score: f64,
    pub recommended_action: String,
    pub time_sensitivity: String,
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    pub diagnosis: String,
    /// Similarity to the submitted study, in percent.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCases {
    pub cases: Vec<SimilarCase>,
    pub cases_searched: u64,
}

/// Patient identity recovered from DICOM metadata, normalized for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientMetadata {
    pub last_name: String,
    pub first_name: String,
    pub patient_id: Option<String>,
    /// ISO `YYYY-MM-DD` when the source tag was parseable.
    pub birth_date: Option<String>,
}

/// Display-ready projection of a raw analysis result.
///
/// Every field is populated with a documented default when the raw payload
/// omits or mangles it; rendering code never has to null-check beyond the
/// `Option` substructures, which are `None` when the server sent nothing
/// usable for that section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Anatomical domain the model routed the image to.
    pub domain: Finding,
    /// All pathology findings, ranked by descending probability.
    pub findings: Vec<Finding>,
    /// The leading findings shown individually.
    pub top_findings: Vec<Finding>,
    /// Aggregated probability mass of everything outside `top_findings`,
    /// omitted when it falls at or below the configured epsilon.
    pub other_findings: Option<f64>,
    pub image_quality: Option<ImageQuality>,
    pub confidence: Option<ConfidenceInfo>,
    pub priority: Option<PriorityInfo>,
    pub similar_cases: Option<SimilarCases>,
    /// Generated clinical report text, when the service produced one.
    pub report_text: Option<String>,
    /// Base64-encoded attention heatmap (PNG).
    pub heatmap: Option<String>,
    /// Base64-encoded render of the submitted image.
    pub original_image: Option<String>,
    pub patient_metadata: Option<PatientMetadata>,
}

impl AnalysisReport {
    /// Decode the heatmap into raw PNG bytes. `None` when absent or not
    /// valid base64.
    pub fn heatmap_bytes(&self) -> Option<Vec<u8>> {
        Self::decode_b64(self.heatmap.as_deref())
    }

    pub fn original_image_bytes(&self) -> Option<Vec<u8>> {
        Self::decode_b64(self.original_image.as_deref())
    }

    fn decode_b64(field: Option<&str>) -> Option<Vec<u8>> {
        let encoded = field?;
        match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding undecodable image payload");
                None
            }
        }
    }
}
