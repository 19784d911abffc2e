use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ExerciseItem, ExerciseKind};

/// Raw answer value reported by an item presenter.
///
/// Indices refer to positions in the authored content, never to a shuffled
/// display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// One string per blank, in blank order.
    Blanks(Vec<String>),
    /// Chosen option indices.
    Choices(BTreeSet<usize>),
    /// `(left, right)` pairings.
    Pairs(Vec<(usize, usize)>),
    /// Segment indices in the order the student placed them.
    Order(Vec<usize>),
    /// Chosen category per entry, in entry order.
    Categories(Vec<usize>),
    /// Selected token indices.
    Selection(BTreeSet<usize>),
}

impl Answer {
    /// The item shape this answer variant belongs to.
    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        match self {
            Answer::Blanks(_) => ExerciseKind::FillBlank,
            Answer::Choices(_) => ExerciseKind::MultipleChoice,
            Answer::Pairs(_) => ExerciseKind::Matching,
            Answer::Order(_) => ExerciseKind::Ordering,
            Answer::Categories(_) => ExerciseKind::Categorize,
            Answer::Selection(_) => ExerciseKind::Selector,
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl ExerciseItem<'_> {
    /// Reference correctness check for presenters.
    ///
    /// An answer of the wrong variant is incorrect.
    #[must_use]
    pub fn judge(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (ExerciseItem::FillBlank(sentence), Answer::Blanks(given)) => {
                given.len() == sentence.blanks.len()
                    && sentence.blanks.iter().zip(given).all(|(blank, value)| {
                        let value = normalize(value);
                        blank.accepted.iter().any(|a| normalize(a) == value)
                    })
            }
            (ExerciseItem::MultipleChoice(question), Answer::Choices(chosen)) => {
                *chosen == question.correct
            }
            (ExerciseItem::Matching(pairs), Answer::Pairs(given)) => {
                let lefts: BTreeSet<usize> = given.iter().map(|(l, _)| *l).collect();
                given.len() == pairs.len()
                    && lefts.len() == pairs.len()
                    && given.iter().all(|(l, r)| l == r && *l < pairs.len())
            }
            (ExerciseItem::Ordering(sequence), Answer::Order(order)) => {
                order.len() == sequence.segments.len()
                    && order.iter().enumerate().all(|(pos, idx)| pos == *idx)
            }
            (ExerciseItem::Categorize { entries, .. }, Answer::Categories(chosen)) => {
                chosen.len() == entries.len()
                    && entries.iter().zip(chosen).all(|(e, c)| e.category == *c)
            }
            (ExerciseItem::Selector(passage), Answer::Selection(selected)) => {
                *selected == passage.targets
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content::{
        Blank, BlankSentence, CategoryEntry, ChoiceQuestion, MatchPair, OrderingSequence,
    };

    #[test]
    fn fill_blank_ignores_case_and_spacing() {
        let sentence = BlankSentence {
            text: "___ is the capital of France".into(),
            blanks: vec![Blank {
                accepted: vec!["Paris".into()],
            }],
        };
        let item = ExerciseItem::FillBlank(&sentence);
        assert!(item.judge(&Answer::Blanks(vec!["  paris ".into()])));
        assert!(!item.judge(&Answer::Blanks(vec!["Lyon".into()])));
        assert!(!item.judge(&Answer::Blanks(Vec::new())));
    }

    #[test]
    fn multiple_choice_requires_exact_set() {
        let question = ChoiceQuestion {
            prompt: "Pick the even numbers".into(),
            options: vec!["1".into(), "2".into(), "4".into()],
            correct: [1, 2].into_iter().collect(),
        };
        let item = ExerciseItem::MultipleChoice(&question);
        assert!(item.judge(&Answer::Choices([1, 2].into_iter().collect())));
        assert!(!item.judge(&Answer::Choices([1].into_iter().collect())));
        assert!(!item.judge(&Answer::Choices([0, 1, 2].into_iter().collect())));
    }

    #[test]
    fn matching_requires_every_pair_once() {
        let pairs = vec![
            MatchPair {
                left: "dog".into(),
                right: "Hund".into(),
            },
            MatchPair {
                left: "cat".into(),
                right: "Katze".into(),
            },
        ];
        let item = ExerciseItem::Matching(&pairs);
        assert!(item.judge(&Answer::Pairs(vec![(1, 1), (0, 0)])));
        assert!(!item.judge(&Answer::Pairs(vec![(0, 1), (1, 0)])));
        assert!(!item.judge(&Answer::Pairs(vec![(0, 0), (0, 0)])));
    }

    #[test]
    fn ordering_requires_authored_order() {
        let sequence = OrderingSequence {
            prompt: None,
            segments: vec!["I".into(), "like".into(), "tea".into()],
        };
        let item = ExerciseItem::Ordering(&sequence);
        assert!(item.judge(&Answer::Order(vec![0, 1, 2])));
        assert!(!item.judge(&Answer::Order(vec![1, 0, 2])));
    }

    #[test]
    fn categorize_checks_each_entry() {
        let categories = vec!["fruit".to_string(), "vegetable".to_string()];
        let entries = vec![
            CategoryEntry {
                text: "apple".into(),
                category: 0,
            },
            CategoryEntry {
                text: "leek".into(),
                category: 1,
            },
        ];
        let item = ExerciseItem::Categorize {
            categories: &categories,
            entries: &entries,
        };
        assert!(item.judge(&Answer::Categories(vec![0, 1])));
        assert!(!item.judge(&Answer::Categories(vec![1, 1])));
    }

    #[test]
    fn wrong_variant_is_incorrect() {
        let sequence = OrderingSequence {
            prompt: None,
            segments: vec!["a".into(), "b".into()],
        };
        let item = ExerciseItem::Ordering(&sequence);
        assert!(!item.judge(&Answer::Choices(BTreeSet::new())));
    }

    #[test]
    fn answer_serializes_with_tag() {
        let answer = Answer::Order(vec![2, 0, 1]);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(answer.kind(), ExerciseKind::Ordering);
    }
}
