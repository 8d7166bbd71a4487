//! Question ordering for practice and test runs.
//!
//! A uniform shuffle followed by one best-effort repair pass that tries to
//! keep consecutive answers from differing by exactly one. Residual
//! violations after the single pass are accepted.

use crate::Calculation;
use rand::seq::SliceRandom;
use rand::Rng;

/// Answers differing by exactly one
fn is_neighbour(a: &Calculation, b: &Calculation) -> bool {
    (a.answer - b.answer).abs() == 1
}

/// Shuffle then repair adjacency
pub fn arrange<R: Rng + ?Sized>(calculations: &mut [Calculation], rng: &mut R) {
    calculations.shuffle(rng);
    let swaps = repair_adjacent(calculations);
    tracing::debug!(
        "Arranged {} calculations ({} adjacency swaps)",
        calculations.len(),
        swaps
    );
}

/// Single left-to-right corrective pass
///
/// When items `i` and `i + 1` are neighbours, `i + 1` is swapped with
/// `i + 2` if the item moved into `i + 1` is not itself a neighbour of `i`.
/// Returns the number of swaps made.
pub fn repair_adjacent(calculations: &mut [Calculation]) -> usize {
    let mut swaps = 0;
    for i in 0..calculations.len().saturating_sub(1) {
        if !is_neighbour(&calculations[i], &calculations[i + 1]) {
            continue;
        }
        if i + 2 < calculations.len() && !is_neighbour(&calculations[i], &calculations[i + 2]) {
            calculations.swap(i + 1, i + 2);
            swaps += 1;
        }
    }
    swaps
}

/// Count adjacent pairs whose answers differ by one
pub fn adjacent_violations(calculations: &[Calculation]) -> usize {
    calculations
        .windows(2)
        .filter(|pair| is_neighbour(&pair[0], &pair[1]))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate, AnswerOutcome, Operation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn with_answers(answers: &[i64]) -> Vec<Calculation> {
        answers
            .iter()
            .map(|&answer| Calculation {
                id: format!("fixture-{}", answer),
                operation: Operation::Addition,
                operand1: 0,
                operand2: answer,
                answer,
                outcome: AnswerOutcome::Pending,
                show_answer: false,
            })
            .collect()
    }

    fn answers(calcs: &[Calculation]) -> Vec<i64> {
        calcs.iter().map(|c| c.answer).collect()
    }

    #[test]
    fn test_repair_moves_far_answer_between_neighbours() {
        let mut calcs = with_answers(&[5, 6, 7, 20]);
        repair_adjacent(&mut calcs);
        // [5,6,7,20] -> [5,7,6,20] -> [5,7,20,6]
        assert_eq!(answers(&calcs), vec![5, 7, 20, 6]);
        assert_eq!(adjacent_violations(&calcs), 0);
    }

    #[test]
    fn test_repair_leaves_unfixable_tail() {
        let mut calcs = with_answers(&[3, 4]);
        assert_eq!(repair_adjacent(&mut calcs), 0);
        assert_eq!(answers(&calcs), vec![3, 4]);
    }

    #[test]
    fn test_repair_skips_swap_that_creates_violation() {
        // 4 is a neighbour of 5 so swapping 6 and 4 would not help
        let mut calcs = with_answers(&[5, 6, 4]);
        assert_eq!(repair_adjacent(&mut calcs), 0);
        assert_eq!(answers(&calcs), vec![5, 6, 4]);
    }

    #[test]
    fn test_repair_on_clean_sequence_is_noop() {
        let mut calcs = with_answers(&[2, 9, 4, 12]);
        assert_eq!(repair_adjacent(&mut calcs), 0);
        assert_eq!(answers(&calcs), vec![2, 9, 4, 12]);
    }

    #[test]
    fn test_arrange_preserves_the_set() {
        let original = generate(Some(Operation::Multiplication), 3, 2, 20, false);
        let mut arranged = original.clone();
        let mut rng = StdRng::seed_from_u64(7);
        arrange(&mut arranged, &mut rng);

        let mut before: Vec<_> = original.iter().map(|c| c.id.clone()).collect();
        let mut after: Vec<_> = arranged.iter().map(|c| c.id.clone()).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_arrange_handles_empty_and_single() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<Calculation> = Vec::new();
        arrange(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut single = with_answers(&[3]);
        arrange(&mut single, &mut rng);
        assert_eq!(answers(&single), vec![3]);
    }
}
