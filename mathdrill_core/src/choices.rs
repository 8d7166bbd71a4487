//! Multiple-choice hints for practice mode.

use rand::seq::SliceRandom;
use rand::Rng;

/// Options shown per question
pub const OPTION_COUNT: usize = 4;

const MIN_SPREAD: i64 = 5;

/// Four distinct positive-leaning options, one of which is `answer`
///
/// Distractors are drawn from `answer ± spread` where the spread is 20% of
/// the answer but at least 5. Only positive values other than the answer
/// are kept. For answers below 1 the window grows until enough positive
/// candidates exist.
pub fn options<R: Rng + ?Sized>(answer: i64, rng: &mut R) -> Vec<i64> {
    let mut spread = MIN_SPREAD.max((answer.abs() as f64 * 0.2) as i64);
    while positive_candidates(answer, spread) < (OPTION_COUNT - 1) as i64 {
        spread *= 2;
    }

    let mut options = vec![answer];
    while options.len() < OPTION_COUNT {
        let candidate = answer + rng.gen_range(-spread..spread);
        if candidate > 0 && !options.contains(&candidate) {
            options.push(candidate);
        }
    }

    options.shuffle(rng);
    options
}

/// Positive values other than `answer` in `[answer - spread, answer + spread)`
fn positive_candidates(answer: i64, spread: i64) -> i64 {
    let lo = (answer - spread).max(1);
    let hi = answer + spread - 1;
    if hi < lo {
        return 0;
    }
    let count = hi - lo + 1;
    if (lo..=hi).contains(&answer) {
        count - 1
    } else {
        count
    }
}
