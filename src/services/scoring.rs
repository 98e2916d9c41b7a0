//! Pure scoring and ranking rules.
//!
//! A correct answer earns the question's points scaled down linearly with the
//! time taken, never less than a floor derived from `min_correct_ratio`. A
//! wrong answer earns nothing. Rankings order by score, then by total time
//! spent answering, then by join order.

use std::cmp::Ordering;

use crate::state::contest::{Participant, Question};

/// Tunables for the speed-weighted formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRules {
    /// Multiplier applied to the speed-weighted points.
    pub scale_factor: f64,
    /// Share of the question points guaranteed to any correct answer.
    pub min_correct_ratio: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            min_correct_ratio: 0.1,
        }
    }
}

/// Verdict for one accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Whether the selected option is the correct one.
    pub is_correct: bool,
    /// Points granted.
    pub points_awarded: u32,
    /// Time between question broadcast and receipt.
    pub time_taken_ms: u64,
}

/// Compare the selected option with the expected one, ignoring surrounding whitespace.
pub fn is_correct_answer(question: &Question, answer: &str) -> bool {
    answer.trim() == question.correct_answer.trim()
}

/// Points for a correct answer given after `time_taken_ms`.
pub fn speed_points(points: u32, allocation_ms: u64, time_taken_ms: u64, rules: &ScoringRules) -> u32 {
    if points == 0 {
        return 0;
    }

    let remaining = if allocation_ms == 0 {
        1.0
    } else {
        (1.0 - time_taken_ms as f64 / allocation_ms as f64).max(0.0)
    };

    let weighted = (f64::from(points) * remaining * rules.scale_factor).round().max(0.0) as u32;
    let floor = ((f64::from(points) * rules.min_correct_ratio).round() as u32).max(1);

    weighted.max(floor)
}

/// Score a submission against its question.
pub fn score_answer(
    question: &Question,
    answer: &str,
    time_taken_ms: u64,
    rules: &ScoringRules,
) -> ScoreOutcome {
    let is_correct = is_correct_answer(question, answer);
    let points_awarded = if is_correct {
        speed_points(
            question.points,
            question.time_allocation_ms(),
            time_taken_ms,
            rules,
        )
    } else {
        0
    };

    ScoreOutcome {
        is_correct,
        points_awarded,
        time_taken_ms,
    }
}

/// Ordering between two participants; equal means "keep join order".
pub fn ranking_order(a: &Participant, b: &Participant) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| a.time_spent_ms().cmp(&b.time_spent_ms()))
}

/// Rank participants given in join order. Ranks are 1-based and unique.
pub fn rank<'a, I>(participants_in_join_order: I) -> Vec<(usize, &'a Participant)>
where
    I: IntoIterator<Item = &'a Participant>,
{
    let mut ordered = participants_in_join_order.into_iter().collect::<Vec<_>>();
    // Stable sort keeps join order for full ties.
    ordered.sort_by(|a, b| ranking_order(a, b));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, participant)| (index + 1, participant))
        .collect()
}
