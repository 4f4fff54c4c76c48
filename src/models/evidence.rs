use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    Photo,
    Note,
    Measurement,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Note => "note",
            Self::Measurement => "measurement",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(Self::Photo),
            "note" => Some(Self::Note),
            "measurement" => Some(Self::Measurement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvidence {
    pub id: String,
    pub task_id: String,
    pub evidence_type: EvidenceType,
    pub file_path: Option<String>,
    pub note_text: Option<String>,
    pub measurement_value: Option<f64>,
    pub gps: Option<GeoPoint>,
    pub is_validated: bool,
    pub captured_offline: bool,
    pub captured_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEvidence {
    pub task_id: String,
    pub evidence_type: EvidenceType,
    pub file_path: Option<String>,
    pub note_text: Option<String>,
    pub measurement_value: Option<f64>,
    pub gps: Option<GeoPoint>,
    pub is_validated: bool,
    pub captured_offline: bool,
}
