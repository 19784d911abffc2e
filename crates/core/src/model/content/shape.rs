use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use thiserror::Error;

use super::ExerciseKind;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Configuration errors: content a session must refuse to start with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("unsupported exercise type: {0}")]
    UnknownKind(String),

    #[error("malformed exercise document: {0}")]
    Malformed(String),

    #[error("{kind} exercise has no items")]
    Empty { kind: ExerciseKind },

    #[error("sentence {index} has no blanks")]
    SentenceWithoutBlanks { index: usize },

    #[error("blank {blank} in sentence {sentence} has no accepted answers")]
    BlankWithoutAnswers { sentence: usize, blank: usize },

    #[error("question {index} needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} has no correct option")]
    NoCorrectOption { index: usize },

    #[error("question {index} marks option {option} correct but has {len} options")]
    CorrectOptionOutOfRange {
        index: usize,
        option: usize,
        len: usize,
    },

    #[error("matching pair {index} has an empty side")]
    EmptyPairSide { index: usize },

    #[error("ordering sequence {index} needs at least two segments")]
    TooFewSegments { index: usize },

    #[error("categorize exercise has no categories")]
    NoCategories,

    #[error("entry {index} refers to unknown category {category}")]
    UnknownCategory { index: usize, category: usize },

    #[error("passage {index} has no target tokens")]
    NoTargets { index: usize },

    #[error("passage {index} targets token {token} but has {len} tokens")]
    TargetOutOfRange {
        index: usize,
        token: usize,
        len: usize,
    },
}

//
// ─── ITEM TYPES ────────────────────────────────────────────────────────────────
//

/// One gap in a fill-in-the-blank sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blank {
    pub accepted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankSentence {
    pub text: String,
    pub blanks: Vec<Blank>,
}

/// A question with one or more correct options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

/// Segments listed in their correct order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSequence {
    #[serde(default)]
    pub prompt: Option<String>,
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub text: String,
    pub category: usize,
}

/// Tokenized passage in which the student selects the target tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorPassage {
    #[serde(default)]
    pub instruction: String,
    pub tokens: Vec<String>,
    pub targets: BTreeSet<usize>,
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// Item list of an exercise, one variant per supported shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExerciseContent {
    FillBlank {
        sentences: Vec<BlankSentence>,
    },
    MultipleChoice {
        questions: Vec<ChoiceQuestion>,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
    Ordering {
        sequences: Vec<OrderingSequence>,
    },
    Categorize {
        categories: Vec<String>,
        entries: Vec<CategoryEntry>,
    },
    Selector {
        passages: Vec<SelectorPassage>,
    },
}

/// Borrowed view of a single answerable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseItem<'a> {
    FillBlank(&'a BlankSentence),
    MultipleChoice(&'a ChoiceQuestion),
    Matching(&'a [MatchPair]),
    Ordering(&'a OrderingSequence),
    Categorize {
        categories: &'a [String],
        entries: &'a [CategoryEntry],
    },
    Selector(&'a SelectorPassage),
}

impl ExerciseItem<'_> {
    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        match self {
            ExerciseItem::FillBlank(_) => ExerciseKind::FillBlank,
            ExerciseItem::MultipleChoice(_) => ExerciseKind::MultipleChoice,
            ExerciseItem::Matching(_) => ExerciseKind::Matching,
            ExerciseItem::Ordering(_) => ExerciseKind::Ordering,
            ExerciseItem::Categorize { .. } => ExerciseKind::Categorize,
            ExerciseItem::Selector(_) => ExerciseKind::Selector,
        }
    }
}

impl ExerciseContent {
    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        match self {
            ExerciseContent::FillBlank { .. } => ExerciseKind::FillBlank,
            ExerciseContent::MultipleChoice { .. } => ExerciseKind::MultipleChoice,
            ExerciseContent::Matching { .. } => ExerciseKind::Matching,
            ExerciseContent::Ordering { .. } => ExerciseKind::Ordering,
            ExerciseContent::Categorize { .. } => ExerciseKind::Categorize,
            ExerciseContent::Selector { .. } => ExerciseKind::Selector,
        }
    }

    /// Number of answerable items. Compound shapes count as one item when non-empty.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Empty` when the shape has nothing to answer.
    pub fn item_count(&self) -> Result<NonZeroUsize, ContentError> {
        let count = match self {
            ExerciseContent::FillBlank { sentences } => sentences.len(),
            ExerciseContent::MultipleChoice { questions } => questions.len(),
            ExerciseContent::Matching { pairs } => usize::from(!pairs.is_empty()),
            ExerciseContent::Ordering { sequences } => sequences.len(),
            ExerciseContent::Categorize { entries, .. } => usize::from(!entries.is_empty()),
            ExerciseContent::Selector { passages } => passages.len(),
        };
        NonZeroUsize::new(count).ok_or(ContentError::Empty { kind: self.kind() })
    }

    /// Returns the item at `index`, if any.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<ExerciseItem<'_>> {
        match self {
            ExerciseContent::FillBlank { sentences } => {
                sentences.get(index).map(ExerciseItem::FillBlank)
            }
            ExerciseContent::MultipleChoice { questions } => {
                questions.get(index).map(ExerciseItem::MultipleChoice)
            }
            ExerciseContent::Matching { pairs } => {
                (index == 0 && !pairs.is_empty()).then_some(ExerciseItem::Matching(pairs))
            }
            ExerciseContent::Ordering { sequences } => {
                sequences.get(index).map(ExerciseItem::Ordering)
            }
            ExerciseContent::Categorize {
                categories,
                entries,
            } => (index == 0 && !entries.is_empty()).then_some(ExerciseItem::Categorize {
                categories,
                entries,
            }),
            ExerciseContent::Selector { passages } => {
                passages.get(index).map(ExerciseItem::Selector)
            }
        }
    }

    /// Structural checks beyond a non-zero item count.
    ///
    /// # Errors
    ///
    /// Returns the first `ContentError` found.
    pub fn validate(&self) -> Result<(), ContentError> {
        self.item_count()?;
        match self {
            ExerciseContent::FillBlank { sentences } => validate_sentences(sentences),
            ExerciseContent::MultipleChoice { questions } => validate_questions(questions),
            ExerciseContent::Matching { pairs } => validate_pairs(pairs),
            ExerciseContent::Ordering { sequences } => {
                match sequences.iter().position(|s| s.segments.len() < 2) {
                    Some(index) => Err(ContentError::TooFewSegments { index }),
                    None => Ok(()),
                }
            }
            ExerciseContent::Categorize {
                categories,
                entries,
            } => validate_categories(categories, entries),
            ExerciseContent::Selector { passages } => validate_passages(passages),
        }
    }
}

fn validate_sentences(sentences: &[BlankSentence]) -> Result<(), ContentError> {
    for (index, sentence) in sentences.iter().enumerate() {
        if sentence.blanks.is_empty() {
            return Err(ContentError::SentenceWithoutBlanks { index });
        }
        for (blank, gap) in sentence.blanks.iter().enumerate() {
            if gap.accepted.iter().all(|a| a.trim().is_empty()) {
                return Err(ContentError::BlankWithoutAnswers {
                    sentence: index,
                    blank,
                });
            }
        }
    }
    Ok(())
}

fn validate_questions(questions: &[ChoiceQuestion]) -> Result<(), ContentError> {
    for (index, question) in questions.iter().enumerate() {
        let len = question.options.len();
        if len < 2 {
            return Err(ContentError::TooFewOptions { index });
        }
        if question.correct.is_empty() {
            return Err(ContentError::NoCorrectOption { index });
        }
        if let Some(&option) = question.correct.iter().find(|&&o| o >= len) {
            return Err(ContentError::CorrectOptionOutOfRange { index, option, len });
        }
    }
    Ok(())
}

fn validate_pairs(pairs: &[MatchPair]) -> Result<(), ContentError> {
    match pairs
        .iter()
        .position(|p| p.left.trim().is_empty() || p.right.trim().is_empty())
    {
        Some(index) => Err(ContentError::EmptyPairSide { index }),
        None => Ok(()),
    }
}

fn validate_categories(
    categories: &[String],
    entries: &[CategoryEntry],
) -> Result<(), ContentError> {
    if categories.is_empty() {
        return Err(ContentError::NoCategories);
    }
    match entries
        .iter()
        .enumerate()
        .find(|(_, e)| e.category >= categories.len())
    {
        Some((index, entry)) => Err(ContentError::UnknownCategory {
            index,
            category: entry.category,
        }),
        None => Ok(()),
    }
}

fn validate_passages(passages: &[SelectorPassage]) -> Result<(), ContentError> {
    for (index, passage) in passages.iter().enumerate() {
        if passage.targets.is_empty() {
            return Err(ContentError::NoTargets { index });
        }
        let len = passage.tokens.len();
        if let Some(&token) = passage.targets.iter().find(|&&t| t >= len) {
            return Err(ContentError::TargetOutOfRange { index, token, len });
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
