//! Sparse floating-point ordering keys.
//!
//! Rows are ingested at `STEP, 2*STEP, ...`, which leaves room to place a row
//! between two neighbours by picking any value strictly between their keys.
//! Repeated halving eventually runs out of representable values; a file that
//! gets that tight is renumbered back to the initial stride.

pub const STEP: f64 = 10.0;

/// Below this fraction of the operands' magnitude a gap counts as exhausted.
const MIN_GAP_RATIO: f64 = 1e-9;

/// Key of the `index`th (zero based) ingested row.
pub fn initial_position(index: usize) -> f64 {
    (index as f64 + 1.0) * STEP
}

/// A key strictly between `before` and `after`, or `None` when the two are
/// out of order or no f64 fits between them.
pub fn midpoint(before: f64, after: f64) -> Option<f64> {
    if !(before < after) {
        return None;
    }
    let mid = before + (after - before) / 2.0;
    (mid > before && mid < after).then_some(mid)
}

pub fn before_first(first: Option<f64>) -> f64 {
    first.map_or(STEP, |p| p - STEP)
}

pub fn after_last(last: Option<f64>) -> f64 {
    last.map_or(STEP, |p| p + STEP)
}

fn gap_exhausted(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    b - a <= scale * MIN_GAP_RATIO || midpoint(a, b).is_none()
}

/// True when ascending `positions` hold a duplicate or a gap too small to
/// split again.
pub fn is_crowded(positions: &[f64]) -> bool {
    positions.windows(2).any(|w| gap_exhausted(w[0], w[1]))
}

/// True when `position` leaves no usable gap to the row before or after it.
/// Only these two gaps change when a single row is written.
pub fn crowds_neighbours(prev: Option<f64>, position: f64, next: Option<f64>) -> bool {
    let window: Vec<f64> = prev.into_iter().chain(Some(position)).chain(next).collect();
    is_crowded(&window)
}

/// Fresh keys for rows given in display order.
pub fn renumbered<I>(ids_in_order: I) -> Vec<(I::Item, f64)>
where
    I: IntoIterator,
{
    ids_in_order
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, initial_position(i)))
        .collect()
}
