use std::cmp::Ordering;

/// Centrality of a document: `(n - 1) / distance_accum`.
///
/// `distance_accum` already includes the epsilon floor, so it is positive.
/// A singleton corpus ranks 0.
#[inline]
pub fn centrality_rank(distance_accum: f64, n: usize) -> f64 {
    debug_assert!(distance_accum > 0.0, "distance total must carry the epsilon floor");
    n.saturating_sub(1) as f64 / distance_accum
}

/// The `k` items with the highest rank, highest first. Ties keep input order.
pub fn top_ranked<T, F>(items: impl IntoIterator<Item = T>, k: usize, rank: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    let mut ranked: Vec<T> = items.into_iter().collect();
    ranked.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}
