//! Line-based item presenter for the terminal.

use async_trait::async_trait;
use practice_core::model::{Answer, ExerciseItem};
use practice_core::scoring::SessionResults;
use practice_core::session::{SessionError, SessionProgress};
use services::{ItemPresenter, PresenterAction};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

pub struct TerminalPresenter<R> {
    lines: Lines<BufReader<R>>,
}

impl TerminalPresenter<tokio::io::Stdin> {
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin + Send> TerminalPresenter<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    async fn read_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read input");
                None
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ItemPresenter for TerminalPresenter<R> {
    async fn present(
        &mut self,
        item: ExerciseItem<'_>,
        progress: &SessionProgress,
    ) -> PresenterAction {
        println!();
        print!("[{}/{}]", progress.position + 1, progress.total);
        if let Some(lives) = progress.lives_remaining {
            print!("  lives: {lives}");
        }
        println!();
        render(item);
        println!("(:skip, :hint, :quit)");

        loop {
            let Some(line) = self.read_line().await else {
                return PresenterAction::Exit;
            };
            match line.trim() {
                ":skip" => return PresenterAction::Skip,
                ":hint" => return PresenterAction::Hint,
                ":quit" | ":q" => return PresenterAction::Exit,
                raw => match parse_answer(item, raw) {
                    Some(answer) => {
                        let is_correct = item.judge(&answer);
                        println!("{}", if is_correct { "correct" } else { "incorrect" });
                        return PresenterAction::Answer { answer, is_correct };
                    }
                    None => println!("could not read that answer, try again"),
                },
            }
        }
    }

    async fn show_hint(&mut self, item: ExerciseItem<'_>, hints_used: u32) {
        println!("hint #{hints_used}: {}", hint_for(item));
    }

    async fn rejected(&mut self, error: &SessionError) {
        println!("{error}");
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn render(item: ExerciseItem<'_>) {
    match item {
        ExerciseItem::FillBlank(sentence) => {
            println!("{}", sentence.text);
            println!("answer each blank, separated by '|'");
        }
        ExerciseItem::MultipleChoice(question) => {
            println!("{}", question.prompt);
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        ExerciseItem::Matching(pairs) => {
            for (i, pair) in pairs.iter().enumerate() {
                println!("  {}. {}", i + 1, pair.left);
            }
            for (shown, idx) in display_order(pairs.len()).into_iter().enumerate() {
                println!("  {}. {}", letter(shown), pairs[idx].right);
            }
            println!("pair them like: 1a 2b");
        }
        ExerciseItem::Ordering(sequence) => {
            if let Some(prompt) = &sequence.prompt {
                println!("{prompt}");
            }
            for (shown, idx) in display_order(sequence.segments.len())
                .into_iter()
                .enumerate()
            {
                println!("  {}. {}", shown + 1, sequence.segments[idx]);
            }
            println!("enter the numbers in the right order");
        }
        ExerciseItem::Categorize {
            categories,
            entries,
        } => {
            for (i, category) in categories.iter().enumerate() {
                println!("  {}. {category}", i + 1);
            }
            for entry in entries {
                println!("  - {}", entry.text);
            }
            println!("enter a category number per entry");
        }
        ExerciseItem::Selector(passage) => {
            println!("{}", passage.instruction);
            for (i, token) in passage.tokens.iter().enumerate() {
                print!("{}:{token} ", i + 1);
            }
            println!();
        }
    }
}

fn hint_for(item: ExerciseItem<'_>) -> String {
    match item {
        ExerciseItem::FillBlank(sentence) => sentence
            .blanks
            .iter()
            .filter_map(|b| b.accepted.first())
            .map(|a| a.chars().next().map_or_else(String::new, |c| format!("{c}…")))
            .collect::<Vec<_>>()
            .join(" | "),
        ExerciseItem::MultipleChoice(question) => {
            format!("{} option(s) are correct", question.correct.len())
        }
        ExerciseItem::Matching(pairs) => format!("{} pairs to match", pairs.len()),
        ExerciseItem::Ordering(sequence) => sequence
            .segments
            .first()
            .map_or_else(String::new, |s| format!("it starts with \"{s}\"")),
        ExerciseItem::Categorize { entries, .. } => format!("{} entries to sort", entries.len()),
        ExerciseItem::Selector(passage) => format!("select {} word(s)", passage.targets.len()),
    }
}

pub fn print_results(results: &SessionResults) {
    println!();
    println!("── results ──");
    println!("ended:    {} ({})", results.state, results.end_reason);
    println!(
        "score:    {}% ({} of {} answered correctly)",
        results.score_percentage, results.correct, results.answered
    );
    println!("skipped:  {}", results.skipped);
    println!("hints:    {}", results.hints_used);
    println!(
        "time:     {}s total, {}s per item",
        results.total_time_seconds, results.average_time_per_item_seconds
    );
    println!("rating:   {} ({} stars)", results.tier, results.stars);
}

//
// ─── PARSING ───────────────────────────────────────────────────────────────────
//

/// Reversed content order, so the authored order is not shown as-is.
fn display_order(len: usize) -> Vec<usize> {
    (0..len).rev().collect()
}

fn letter(i: usize) -> char {
    u8::try_from(i)
        .ok()
        .filter(|i| *i < 26)
        .map_or('?', |i| char::from(b'a' + i))
}

/// 1-based numbers separated by spaces or commas, as 0-based indices.
fn parse_numbers(raw: &str) -> Option<Vec<usize>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok()?.checked_sub(1))
        .collect()
}

/// `1a 2b` style pairings, as `(left, display-right)` indices.
fn parse_pairs(raw: &str) -> Option<Vec<(usize, usize)>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let split = s.find(|c: char| c.is_ascii_alphabetic())?;
            let (num, rest) = s.split_at(split);
            let left = num.parse::<usize>().ok()?.checked_sub(1)?;
            let mut chars = rest.chars();
            let c = chars.next()?.to_ascii_lowercase();
            if chars.next().is_some() {
                return None;
            }
            Some((left, (c as usize).checked_sub('a' as usize)?))
        })
        .collect()
}

fn parse_answer(item: ExerciseItem<'_>, raw: &str) -> Option<Answer> {
    if raw.is_empty() {
        return None;
    }
    match item {
        ExerciseItem::FillBlank(_) => Some(Answer::Blanks(
            raw.split('|').map(|s| s.trim().to_owned()).collect(),
        )),
        ExerciseItem::MultipleChoice(_) => {
            parse_numbers(raw).map(|v| Answer::Choices(v.into_iter().collect()))
        }
        ExerciseItem::Matching(pairs) => {
            let order = display_order(pairs.len());
            parse_pairs(raw)?
                .into_iter()
                .map(|(left, shown)| order.get(shown).map(|right| (left, *right)))
                .collect::<Option<Vec<_>>>()
                .map(Answer::Pairs)
        }
        ExerciseItem::Ordering(sequence) => {
            let order = display_order(sequence.segments.len());
            parse_numbers(raw)?
                .into_iter()
                .map(|shown| order.get(shown).copied())
                .collect::<Option<Vec<_>>>()
                .map(Answer::Order)
        }
        ExerciseItem::Categorize { .. } => parse_numbers(raw).map(Answer::Categories),
        ExerciseItem::Selector(_) => {
            parse_numbers(raw).map(|v| Answer::Selection(v.into_iter().collect()))
        }
    }
}
