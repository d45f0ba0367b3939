//! Small statistics helpers.

use std::collections::HashMap;
use std::hash::Hash;

/// Most frequent value, or `None` for an empty input.
///
/// When several values share the highest count the smallest of them is
/// returned, so the result does not depend on iteration order.
pub fn mode_min<T, I>(values: I) -> Option<T>
where
    T: Copy + Ord + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(value_a, count_a), (value_b, count_b)| {
            count_a.cmp(count_b).then_with(|| value_b.cmp(value_a))
        })
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_single_winner() {
        assert_eq!(mode_min([3usize, 1, 3, 2, 3, 1]), Some(3));
    }

    #[test]
    fn test_mode_tie_takes_smallest() {
        assert_eq!(mode_min([5usize, 2, 5, 2, 9]), Some(2));
        assert_eq!(mode_min([-3i64, 7, -12, 7, -3, -12]), Some(-12));
    }

    #[test]
    fn test_mode_empty() {
        assert_eq!(mode_min(Vec::<usize>::new()), None);
    }

    #[test]
    fn test_mode_single_value() {
        assert_eq!(mode_min([4usize]), Some(4));
    }
}
