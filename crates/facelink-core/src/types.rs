use serde::{Deserialize, Serialize};

/// Distance at which a comparison scores 0% confidence.
pub const DISTANCE_THRESHOLD: f64 = 0.4;

/// Rescale a service-reported distance into a 0–100 display value.
///
/// Linear, not a probability: `100 - (distance / 0.4) * 100`, clamped low
/// first, then high.
pub fn confidence(distance: f64) -> f64 {
    let score = (100.0 - (distance / DISTANCE_THRESHOLD) * 100.0).max(0.0);
    score.min(100.0)
}

/// One enrollable identity: a label and the reference image it is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub label: String,
    /// Base64 data URL or opaque token understood by the service. Empty = not enrolled.
    pub reference: String,
}

impl RegistryEntry {
    pub fn new(label: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reference: reference.into(),
        }
    }

    /// The reference value, if there is one to compare against.
    pub fn reference(&self) -> Option<&str> {
        if self.reference.is_empty() {
            None
        } else {
            Some(&self.reference)
        }
    }
}

/// Ordered, immutable set of identities checked by verify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRegistry {
    entries: Vec<RegistryEntry>,
}

impl IdentityRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RegistryEntry> for IdentityRegistry {
    fn from_iter<I: IntoIterator<Item = RegistryEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A still frame encoded for transport (`data:image/png;base64,...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame(String);

impl CaptureFrame {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which remote operation a capture feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Verify,
    Analyze,
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Purpose::Verify => f.write_str("verify"),
            Purpose::Analyze => f.write_str("analyze"),
        }
    }
}

/// Request options shared by every call to the recognition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub model_name: String,
    pub detector_backend: String,
    pub distance_metric: String,
    pub anti_spoofing: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            model_name: "Facenet".to_string(),
            detector_backend: "opencv".to_string(),
            distance_metric: "cosine".to_string(),
            anti_spoofing: false,
        }
    }
}

impl RecognitionSettings {
    /// Build the body comparing `frame` against one registry reference.
    pub fn verify_request(&self, frame: &CaptureFrame, reference: &str) -> VerifyRequest {
        VerifyRequest {
            model_name: self.model_name.clone(),
            detector_backend: self.detector_backend.clone(),
            distance_metric: self.distance_metric.clone(),
            align: true,
            img1: frame.as_str().to_string(),
            img2: reference.to_string(),
            enforce_detection: false,
            anti_spoofing: self.anti_spoofing,
        }
    }

    pub fn analyze_request(&self, frame: &CaptureFrame) -> AnalyzeRequest {
        AnalyzeRequest {
            detector_backend: self.detector_backend.clone(),
            align: true,
            img: frame.as_str().to_string(),
            enforce_detection: false,
            anti_spoofing: self.anti_spoofing,
        }
    }
}

/// Body of `POST {endpoint}/verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub model_name: String,
    pub detector_backend: String,
    pub distance_metric: String,
    pub align: bool,
    pub img1: String,
    pub img2: String,
    pub enforce_detection: bool,
    pub anti_spoofing: bool,
}

/// Response of `POST {endpoint}/verify`. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Body of `POST {endpoint}/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub detector_backend: String,
    pub align: bool,
    pub img: String,
    pub enforce_detection: bool,
    pub anti_spoofing: bool,
}

/// Response of `POST {endpoint}/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub results: Vec<FaceAttributes>,
}

/// Demographic and emotion estimate for one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub age: f64,
    pub dominant_race: String,
    pub dominant_gender: String,
    pub dominant_emotion: String,
}

impl FaceAttributes {
    /// One-sentence summary, e.g. `30 years old asian Man with happy mood.`
    pub fn summary(&self) -> String {
        format!(
            "{} years old {} {} with {} mood.",
            self.age, self.dominant_race, self.dominant_gender, self.dominant_emotion
        )
    }
}

/// Outcome of checking one frame against the whole registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyOutcome {
    pub verified: bool,
    /// Label of the first matching entry.
    pub identity: Option<String>,
    /// Score of the last comparison the service answered.
    pub confidence: Option<f64>,
    /// Requests issued, including rejected ones.
    pub attempts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_reference_points() {
        assert_eq!(confidence(0.0), 100.0);
        assert_eq!(confidence(0.4), 0.0);
        assert_eq!(confidence(0.8), 0.0);
        assert!((confidence(0.2) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_negative_distance_clamps_high() {
        assert_eq!(confidence(-0.4), 100.0);
    }

    #[test]
    fn test_summary_format() {
        let face = FaceAttributes {
            age: 30.0,
            dominant_race: "asian".into(),
            dominant_gender: "Man".into(),
            dominant_emotion: "happy".into(),
        };
        assert_eq!(face.summary(), "30 years old asian Man with happy mood.");
    }

    #[test]
    fn test_summary_fractional_age() {
        let face = FaceAttributes {
            age: 27.5,
            dominant_race: "white".into(),
            dominant_gender: "Woman".into(),
            dominant_emotion: "neutral".into(),
        };
        assert_eq!(face.summary(), "27.5 years old white Woman with neutral mood.");
    }

    #[test]
    fn test_registry_preserves_order() {
        let registry: IdentityRegistry = ["carol", "alice", "bob"]
            .into_iter()
            .map(|l| RegistryEntry::new(l, "ref"))
            .collect();
        let labels: Vec<_> = registry.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["carol", "alice", "bob"]);
    }

    #[test]
    fn test_empty_reference_is_none() {
        assert!(RegistryEntry::new("x", "").reference().is_none());
        assert_eq!(RegistryEntry::new("x", "abc").reference(), Some("abc"));
    }

    #[test]
    fn test_verify_request_wire_format() {
        let settings = RecognitionSettings {
            anti_spoofing: true,
            ..RecognitionSettings::default()
        };
        let req = settings.verify_request(&CaptureFrame::new("data:frame"), "data:ref");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model_name": "Facenet",
                "detector_backend": "opencv",
                "distance_metric": "cosine",
                "align": true,
                "img1": "data:frame",
                "img2": "data:ref",
                "enforce_detection": false,
                "anti_spoofing": true,
            })
        );
    }

    #[test]
    fn test_verify_response_ignores_extra_fields() {
        let resp: VerifyResponse = serde_json::from_str(
            r#"{"verified": true, "distance": 0.12, "threshold": 0.4, "model": "Facenet"}"#,
        )
        .unwrap();
        assert!(resp.verified);
        assert_eq!(resp.distance, Some(0.12));
    }

    #[test]
    fn test_analyze_response_parses_integer_age() {
        let resp: AnalyzeResponse = serde_json::from_str(
            r#"{"results": [{"age": 30, "dominant_race": "asian", "dominant_gender": "Man",
                "dominant_emotion": "happy", "region": {"x": 1}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.results[0].summary(), "30 years old asian Man with happy mood.");
    }
}
