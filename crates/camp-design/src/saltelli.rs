//! Saltelli cross-sampling with second-order terms.
//!
//! Each base point of dimension `2D` is split into matrices `A` (first `D`
//! columns) and `B` (last `D` columns) and expanded, in this order, into
//! `A, AB_1..AB_D, BA_1..BA_D, B`, where `AB_k` is `A` with column `k` taken
//! from `B` and `BA_k` is `B` with column `k` taken from `A`. A base sample of
//! `N` points therefore yields `N * (2D + 2)` rows.

use crate::sobol::SobolSequence;

/// Number of rows produced for `variables` dimensions and `base` points.
pub fn saltelli_row_count(variables: usize, base: usize) -> usize {
    base * (2 * variables + 2)
}

/// Largest power of two not exceeding `requested` (`requested >= 1`).
pub fn balanced_base_size(requested: usize) -> usize {
    if requested == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - requested.leading_zeros())
}

/// Draws `base` Sobol points of dimension `2 * variables` and expands them
/// into unit-cube Saltelli rows.
pub fn saltelli_unit_rows(
    sequence: &mut SobolSequence,
    variables: usize,
    base: usize,
) -> Vec<Vec<f64>> {
    debug_assert_eq!(sequence.dimensions(), 2 * variables);
    let mut rows = Vec::with_capacity(saltelli_row_count(variables, base));
    for point in sequence.take_points(base) {
        let (a, b) = point.split_at(variables);
        rows.push(a.to_vec());
        for k in 0..variables {
            let mut ab = a.to_vec();
            ab[k] = b[k];
            rows.push(ab);
        }
        for k in 0..variables {
            let mut ba = b.to_vec();
            ba[k] = a[k];
            rows.push(ba);
        }
        rows.push(b.to_vec());
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_size_rounds_down_to_power_of_two() {
        assert_eq!(balanced_base_size(1), 1);
        assert_eq!(balanced_base_size(8), 8);
        assert_eq!(balanced_base_size(11), 8);
        assert_eq!(balanced_base_size(1023), 512);
    }

    #[test]
    fn expansion_interleaves_columns() {
        let mut seq = SobolSequence::new(4).expect("sequence");
        let rows = saltelli_unit_rows(&mut seq, 2, 2);
        assert_eq!(rows.len(), saltelli_row_count(2, 2));
        // Second base point is (0.5, 0.5, 0.5, 0.5) so every block repeats it.
        assert!(rows[6..12].iter().all(|row| row == &vec![0.5, 0.5]));
        // First block is all zeros.
        assert!(rows[0..6].iter().all(|row| row == &vec![0.0, 0.0]));
    }

    #[test]
    fn expansion_order_is_a_ab_ba_b() {
        let mut seq = SobolSequence::new(4).expect("sequence");
        seq.take_points(4);
        // Fifth point: (0.375, 0.375, 0.625, 0.875).
        let rows = saltelli_unit_rows(&mut seq, 2, 1);
        assert_eq!(
            rows,
            vec![
                vec![0.375, 0.375],
                vec![0.625, 0.375],
                vec![0.375, 0.875],
                vec![0.375, 0.875],
                vec![0.625, 0.375],
                vec![0.625, 0.875],
            ]
        );
    }
}
