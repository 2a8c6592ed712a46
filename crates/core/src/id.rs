use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier shared by a highlight and its paired notation.
///
/// Fresh identifiers are UUID v4 strings. Saved containers may carry numeric
/// identifiers; those are kept in their JSON text form so `7` and `"7"` name the
/// same annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for AnnotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for AnnotationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for AnnotationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

/// Clip-path tag for a freshly created highlight.
pub fn fresh_clip_path_id() -> String {
    format!("clipPath-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = AnnotationId::new();
        let b = AnnotationId::new();
        assert_ne!(a, b);
        assert_ne!(fresh_clip_path_id(), fresh_clip_path_id());
    }

    #[test]
    fn numeric_and_string_ids_compare_equal() {
        let numeric: AnnotationId = serde_json::from_str("7").expect("number should decode");
        let text: AnnotationId = serde_json::from_str("\"7\"").expect("string should decode");

        assert_eq!(numeric, text);
        assert_eq!(numeric, AnnotationId::from(7));
        assert_eq!(serde_json::to_string(&numeric).expect("serialize"), "\"7\"");
    }

    #[test]
    fn fractional_numeric_ids_keep_their_text() {
        let id: AnnotationId = serde_json::from_str("0.25").expect("number should decode");
        assert_eq!(id.as_str(), "0.25");
    }

    #[test]
    fn rejects_non_scalar_ids() {
        assert!(serde_json::from_str::<AnnotationId>("[1]").is_err());
    }
}
