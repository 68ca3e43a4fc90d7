use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamType {
    /// Serialized, unlike other record ids: time slots reference exam types by id
    #[serde(default)]
    pub id: Option<i64>,
    pub description: String,
}

impl ExamType {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
        }
    }
}
