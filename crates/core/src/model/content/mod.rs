mod answer;
mod kind;
mod shape;

pub use answer::Answer;
pub use kind::ExerciseKind;
pub use shape::{
    Blank, BlankSentence, CategoryEntry, ChoiceQuestion, ContentError, ExerciseContent,
    ExerciseItem, MatchPair, OrderingSequence, SelectorPassage,
};
