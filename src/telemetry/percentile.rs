//! Order-statistic selection for latency percentiles.
//!
//! Snapshot rebuilds need only three order statistics (p50/p95/p99), so a
//! full sort is wasted work. Quickselect partitions in place and runs in
//! O(n) on average; the median-of-three pivot keeps adversarial inputs away
//! from the quadratic worst case. Callers pass a scratch copy since the
//! buffer is reordered.

/// Return the k-th smallest element (0-indexed) of `data`.
///
/// Panics if `data` is empty or `k` is out of bounds.
pub fn quickselect(data: &mut [f64], k: usize) -> f64 {
    assert!(!data.is_empty() && k < data.len());

    let mut lo = 0;
    let mut hi = data.len() - 1;

    loop {
        if lo == hi {
            return data[lo];
        }

        let mid = lo + (hi - lo) / 2;
        let pivot_idx = median_of_three(data, lo, mid, hi);
        data.swap(pivot_idx, hi);

        let pivot = data[hi];
        let mut store = lo;
        for i in lo..hi {
            if data[i] < pivot {
                data.swap(i, store);
                store += 1;
            }
        }
        data.swap(store, hi);

        match k.cmp(&store) {
            std::cmp::Ordering::Equal => return data[store],
            std::cmp::Ordering::Less => hi = store - 1,
            std::cmp::Ordering::Greater => lo = store + 1,
        }
    }
}

/// Index of the median value among three positions.
fn median_of_three(data: &[f64], a: usize, b: usize, c: usize) -> usize {
    let (va, vb, vc) = (data[a], data[b], data[c]);
    if (va <= vb && vb <= vc) || (vc <= vb && vb <= va) {
        b
    } else if (vb <= va && va <= vc) || (vc <= va && va <= vb) {
        a
    } else {
        c
    }
}

/// The p-th percentile of `data` using rank `ceil(p/100 * n) - 1`.
///
/// Returns 0.0 for an empty buffer. Reorders `data` in place.
pub fn percentile(data: &mut [f64], p: f64) -> f64 {
    let n = data.len();
    if n == 0 {
        return 0.0;
    }
    let rank = ((p / 100.0 * n as f64).ceil() as usize)
        .saturating_sub(1)
        .min(n - 1);
    quickselect(data, rank)
}
