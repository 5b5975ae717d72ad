/// Order that stably sorts small integer `keys`, such as bin indices.
///
/// Runs in `O(n + max_key)`, so it suits keys bounded by the number of bins.
///
/// ```rust
/// use ddmd::utils::counting_sort_order;
///
/// let bins = [2, 0, 1, 0];
/// let order = counting_sort_order(&bins);
/// assert_eq!(order, vec![1, 3, 2, 0]);
/// assert!(order.windows(2).all(|w| bins[w[0]] <= bins[w[1]]));
/// ```
pub fn counting_sort_order(keys: &[usize]) -> Vec<usize> {
    let Some(&max) = keys.iter().max() else {
        return Vec::new();
    };
    // Start offset of each key in the output
    let mut start = vec![0usize; max + 2];
    for &k in keys {
        start[k + 1] += 1;
    }
    for k in 1..start.len() {
        start[k] += start[k - 1];
    }
    let mut order = vec![0; keys.len()];
    for (i, &k) in keys.iter().enumerate() {
        order[start[k]] = i;
        start[k] += 1;
    }
    order
}

/// Move the first `order.len()` elements of `values` into `order`; any
/// elements beyond (e.g. ghost atoms) keep their place.
///
/// ```rust
/// use ddmd::utils::{apply_order, counting_sort_order};
///
/// let order = counting_sort_order(&[2, 0, 1]);
/// let mut tags = vec![10_u64, 20, 30, 99];
/// apply_order(&order, &mut tags);
/// assert_eq!(tags, vec![20, 30, 10, 99]);
/// ```
pub fn apply_order<T: Clone>(order: &[usize], values: &mut Vec<T>) {
    assert!(order.len() <= values.len());
    let sorted: Vec<T> = order.iter().map(|&i| values[i].clone()).collect();
    values.splice(..order.len(), sorted);
}
