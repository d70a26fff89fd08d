use serde::{Deserialize, Serialize};

/// Patient context supplied by the caller for report headers.
/// The pipeline only ever reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl PatientInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>, age: u32) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id.into()),
            age: Some(age),
        }
    }
}
