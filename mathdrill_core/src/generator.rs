//! Calculation generation.
//!
//! Builds one calculation per integer in the configured range, in ascending
//! order. Subtraction and division are constructed so the answer is always
//! the range index, which keeps every operand a non-negative integer.

use crate::{AnswerOutcome, Calculation, DrillConfig, Operation};

/// Generate the ordered calculation set for a configuration
///
/// Returns an empty list when no operation is chosen or the range is
/// inverted. Ids are derived from the inputs only, so regenerating the same
/// configuration yields the same ids.
pub fn generate(
    operation: Option<Operation>,
    base_number: i64,
    range_min: i64,
    range_max: i64,
    is_square_numbers: bool,
) -> Vec<Calculation> {
    let Some(operation) = operation else {
        tracing::debug!("No operation selected, nothing to generate");
        return Vec::new();
    };

    let calculations: Vec<Calculation> = (range_min..=range_max)
        .map(|i| {
            let (operand1, operand2, answer) = match operation {
                Operation::Addition => (base_number, i, base_number + i),
                Operation::Subtraction => (base_number + i, base_number, i),
                Operation::Multiplication if is_square_numbers => (i, i, i * i),
                Operation::Multiplication => (base_number, i, base_number * i),
                Operation::Division => (base_number * i, base_number, i),
            };

            Calculation {
                id: format!(
                    "{}-{}-{}-{}-{}",
                    operation, base_number, i, operand1, operand2
                ),
                operation,
                operand1,
                operand2,
                answer,
                outcome: AnswerOutcome::Pending,
                show_answer: true,
            }
        })
        .collect();

    tracing::debug!(
        "Generated {} {} calculations for base {} over [{}, {}]",
        calculations.len(),
        operation,
        base_number,
        range_min,
        range_max
    );

    calculations
}

/// Generate from a [`DrillConfig`]
pub fn generate_for(config: &DrillConfig) -> Vec<Calculation> {
    generate(
        config.operation,
        config.base_number,
        config.range_min,
        config.range_max,
        config.is_square_numbers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_count_order_and_unique_ids() {
        for op in Operation::ALL {
            let calcs = generate(Some(op), 7, 2, 20, false);
            assert_eq!(calcs.len(), 19);

            let ids: HashSet<_> = calcs.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(ids.len(), calcs.len(), "duplicate ids for {}", op);
            assert!(calcs.iter().all(|c| c.show_answer));
            assert!(calcs.iter().all(|c| !c.is_completed()));
        }
    }

    #[test]
    fn test_ids_are_deterministic() {
        let first = generate(Some(Operation::Division), 4, 2, 10, false);
        let second = generate(Some(Operation::Division), 4, 2, 10, false);
        assert_eq!(first, second);
        assert_eq!(first[0].id, "division-4-2-8-4");
    }

    #[test]
    fn test_addition_operands() {
        let calcs = generate(Some(Operation::Addition), 5, 2, 10, false);
        for (offset, calc) in calcs.iter().enumerate() {
            assert_eq!(calc.operand1, 5);
            assert_eq!(calc.operand2, 2 + offset as i64);
            assert_eq!(calc.operand1 + calc.operand2, calc.answer);
        }
    }

    #[test]
    fn test_subtraction_and_division_answer_is_index() {
        for op in [Operation::Subtraction, Operation::Division] {
            let calcs = generate(Some(op), 6, 1, 12, false);
            for (offset, calc) in calcs.iter().enumerate() {
                assert_eq!(calc.answer, 1 + offset as i64);
                assert!(calc.operand1 >= 0 && calc.operand2 >= 0);
            }
        }

        let division = generate(Some(Operation::Division), 3, 2, 4, false);
        assert_eq!(
            division
                .iter()
                .map(|c| (c.operand1, c.operand2))
                .collect::<Vec<_>>(),
            vec![(6, 3), (9, 3), (12, 3)]
        );
    }

    #[test]
    fn test_multiplication_modes() {
        let normal = generate(Some(Operation::Multiplication), 3, 2, 4, false);
        assert_eq!(
            normal.iter().map(|c| c.answer).collect::<Vec<_>>(),
            vec![6, 9, 12]
        );

        let squares = generate(Some(Operation::Multiplication), 3, 2, 5, true);
        for (offset, calc) in squares.iter().enumerate() {
            let i = 2 + offset as i64;
            assert_eq!(calc.operand1, i);
            assert_eq!(calc.operand2, i);
            assert_eq!(calc.answer, i * i);
        }
    }

    #[test]
    fn test_square_flag_ignored_for_other_operations() {
        let calcs = generate(Some(Operation::Addition), 3, 2, 4, true);
        assert!(calcs.iter().all(|c| c.operand1 == 3));
    }

    #[test]
    fn test_missing_operation_yields_empty() {
        assert!(generate(None, 2, 2, 10, false).is_empty());
        assert!(generate_for(&DrillConfig::default()).is_empty());
    }

    #[test]
    fn test_single_item_and_inverted_range() {
        assert_eq!(generate(Some(Operation::Addition), 2, 5, 5, false).len(), 1);
        assert!(generate(Some(Operation::Addition), 2, 6, 5, false).is_empty());
    }
}
