use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::model::content::{ContentError, ExerciseContent, ExerciseItem, ExerciseKind};
use crate::model::ids::{ExerciseId, PackageId};

/// A single practice unit of one content shape.
///
/// `difficulty` and `category` are catalog classifications and carry no
/// meaning for the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub package_id: PackageId,
    pub title: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub content: ExerciseContent,
}

impl Exercise {
    #[must_use]
    pub fn new(
        id: ExerciseId,
        package_id: PackageId,
        title: impl Into<String>,
        content: ExerciseContent,
    ) -> Self {
        Self {
            id,
            package_id,
            title: title.into(),
            difficulty: None,
            category: None,
            content,
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Parse an exercise document.
    ///
    /// The content tag is checked before the full parse so an unsupported
    /// shape surfaces as `ContentError::UnknownKind` rather than a generic
    /// parse failure. Tag spellings accepted by `ExerciseKind::from_str`
    /// (`Fill-Blank`, ` ORDERING `) are rewritten to the canonical form.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::UnknownKind` for an unrecognized `type` tag and
    /// `ContentError::Malformed` for any other decoding problem.
    pub fn from_json(raw: &str) -> Result<Self, ContentError> {
        let mut value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ContentError::Malformed(e.to_string()))?;
        let tag = value
            .get_mut("content")
            .and_then(|c| c.get_mut("type"))
            .filter(|t| t.is_string())
            .ok_or_else(|| ContentError::Malformed("missing content type".into()))?;
        let kind = tag.as_str().unwrap_or_default().parse::<ExerciseKind>()?;
        *tag = serde_json::Value::from(kind.as_str());
        serde_json::from_value(value).map_err(|e| ContentError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        self.content.kind()
    }

    /// Number of answerable items; the denominator for progress.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Empty` if there is nothing to answer.
    pub fn item_count(&self) -> Result<NonZeroUsize, ContentError> {
        self.content.item_count()
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<ExerciseItem<'_>> {
        self.content.item(index)
    }

    /// Full structural validation, run before a session may start.
    ///
    /// # Errors
    ///
    /// Returns the first `ContentError` found.
    pub fn validate(&self) -> Result<NonZeroUsize, ContentError> {
        self.content.validate()?;
        self.item_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "id": "ex-1",
        "package_id": "pkg-9",
        "title": "Capitals",
        "difficulty": "easy",
        "content": {
            "type": "fill_blank",
            "sentences": [
                {"text": "___ is in France", "blanks": [{"accepted": ["Paris"]}]},
                {"text": "___ is in Spain", "blanks": [{"accepted": ["Madrid"]}]}
            ]
        }
    }"#;

    #[test]
    fn parses_document_and_counts_items() {
        let exercise = Exercise::from_json(DOC).unwrap();
        assert_eq!(exercise.kind(), ExerciseKind::FillBlank);
        assert_eq!(exercise.validate().unwrap().get(), 2);
        assert_eq!(exercise.difficulty.as_deref(), Some("easy"));
        assert!(exercise.category.is_none());
    }

    #[test]
    fn unknown_type_tag_is_reported_as_such() {
        let doc = DOC.replace("fill_blank", "crossword");
        let err = Exercise::from_json(&doc).unwrap_err();
        assert_eq!(err, ContentError::UnknownKind("crossword".into()));
    }

    #[test]
    fn loose_type_tag_spelling_is_accepted() {
        let doc = DOC.replace("\"fill_blank\"", "\"Fill-Blank\"");
        let exercise = Exercise::from_json(&doc).unwrap();
        assert_eq!(exercise.kind(), ExerciseKind::FillBlank);
        assert_eq!(exercise.item_count().unwrap().get(), 2);
    }

    #[test]
    fn broken_document_is_malformed() {
        let err = Exercise::from_json("{\"id\": 1}").unwrap_err();
        assert!(matches!(err, ContentError::Malformed(_)));
    }

    #[test]
    fn item_count_is_deterministic() {
        let exercise = Exercise::from_json(DOC).unwrap();
        assert_eq!(exercise.item_count(), exercise.item_count());
    }
}
