//! Randomization helpers shared by the scheduler and profile selection.

use rand::seq::SliceRandom;

/// Shuffle a slice in place (unbiased Fisher-Yates permutation).
pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}

/// Pick one element uniformly at random.
pub fn choose<T: Clone>(items: &[T]) -> Option<T> {
    items.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_is_a_permutation() {
        let original: Vec<u32> = (0..50).collect();
        let mut shuffled = original.clone();
        shuffle(&mut shuffled);

        assert_eq!(shuffled.len(), original.len());

        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
    }

    #[test]
    fn shuffle_handles_trivial_inputs() {
        let mut empty: Vec<u32> = vec![];
        shuffle(&mut empty);
        assert!(empty.is_empty());

        let mut single = vec![7];
        shuffle(&mut single);
        assert_eq!(single, vec![7]);
    }

    #[test]
    fn choose_from_empty_is_none() {
        let items: Vec<String> = vec![];
        assert!(choose(&items).is_none());
    }

    #[test]
    fn choose_returns_an_element() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let picked = choose(&items).unwrap();
        assert!(items.contains(&picked));
    }
}
