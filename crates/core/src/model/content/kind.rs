use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ContentError;

/// Tag selecting which item shape an exercise carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    FillBlank,
    MultipleChoice,
    Matching,
    Ordering,
    Categorize,
    Selector,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 6] = [
        ExerciseKind::FillBlank,
        ExerciseKind::MultipleChoice,
        ExerciseKind::Matching,
        ExerciseKind::Ordering,
        ExerciseKind::Categorize,
        ExerciseKind::Selector,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::FillBlank => "fill_blank",
            ExerciseKind::MultipleChoice => "multiple_choice",
            ExerciseKind::Matching => "matching",
            ExerciseKind::Ordering => "ordering",
            ExerciseKind::Categorize => "categorize",
            ExerciseKind::Selector => "selector",
        }
    }

    /// Compound shapes present their whole content as one item.
    #[must_use]
    pub fn is_compound(self) -> bool {
        matches!(self, ExerciseKind::Matching | ExerciseKind::Categorize)
    }

    /// Whether the student may skip an item of this shape.
    #[must_use]
    pub fn is_skippable(self) -> bool {
        !self.is_compound()
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ContentError::UnknownKind(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags() {
        assert_eq!(
            "multiple_choice".parse::<ExerciseKind>().unwrap(),
            ExerciseKind::MultipleChoice
        );
        assert_eq!(
            "Fill-Blank".parse::<ExerciseKind>().unwrap(),
            ExerciseKind::FillBlank
        );
    }

    #[test]
    fn unknown_tag_is_configuration_error() {
        let err = "crossword".parse::<ExerciseKind>().unwrap_err();
        assert_eq!(err, ContentError::UnknownKind("crossword".into()));
    }

    #[test]
    fn compound_shapes_are_not_skippable() {
        assert!(!ExerciseKind::Matching.is_skippable());
        assert!(!ExerciseKind::Categorize.is_skippable());
        assert!(ExerciseKind::Ordering.is_skippable());
    }
}
