//! Master/stack slot geometry.

use super::ratios::{ScopeRatios, normalized_weights};
use crate::common::config::LayoutSettings;
use crate::model::Rect;

/// Produces `n` slot rectangles inside `bounds`.
///
/// One window gets the whole area. Two or more get a master pane on the
/// left and a stack pane on the right, the stack cut into `n - 1` rows.
/// Boundaries are rounded to whole pixels before the slot margin is applied,
/// so adjacent slots are separated by exactly twice the margin.
pub fn make_slots(
    n: usize,
    bounds: Rect,
    ratios: &ScopeRatios,
    settings: &LayoutSettings,
) -> Vec<Rect> {
    let margin = settings.slot_margin;
    match n {
        0 => vec![],
        1 => vec![bounds.inset(margin)],
        _ => {
            let ratio = ratios.clamped_master_ratio(bounds.size.width, settings.min_extent);
            let split = (bounds.min_x() + bounds.size.width * ratio).round();
            let split = split.clamp(bounds.min_x(), bounds.max_x());

            let master = Rect::new(
                bounds.min_x(),
                bounds.min_y(),
                split - bounds.min_x(),
                bounds.size.height,
            );
            let stack = Rect::new(split, bounds.min_y(), bounds.max_x() - split, bounds.size.height);

            let rows = n - 1;
            let weights = normalized_weights(&ratios.stack_weights, rows);
            let extents = resolve_extents(stack.size.height, &weights, settings.min_extent);

            let mut slots = Vec::with_capacity(n);
            slots.push(master.inset(margin));
            let mut offset = 0.0;
            let mut top = stack.min_y();
            for (i, extent) in extents.iter().enumerate() {
                offset += extent;
                let bottom = if i + 1 == rows {
                    stack.max_y()
                } else {
                    (stack.min_y() + offset).round().min(stack.max_y())
                };
                let row = Rect::new(stack.min_x(), top, stack.size.width, (bottom - top).max(0.0));
                slots.push(row.inset(margin));
                top = bottom;
            }
            slots
        }
    }
}

/// Splits `total` among rows in proportion to `weights` while keeping every
/// row at least `min`.
///
/// Rows that would fall below the minimum are pinned to it and the rest is
/// shared among the others. When `total` cannot cover the minimum for every
/// row, rows are served in order and the trailing ones absorb the shortfall.
pub(crate) fn resolve_extents(total: f64, weights: &[f64], min: f64) -> Vec<f64> {
    let count = weights.len();
    let total = total.max(0.0);
    if count == 0 {
        return vec![];
    }

    if total < min * count as f64 {
        let mut remaining = total;
        return weights
            .iter()
            .map(|_| {
                let extent = min.min(remaining);
                remaining -= extent;
                extent
            })
            .collect();
    }

    let mut pinned = vec![false; count];
    let mut extents = vec![0.0; count];
    loop {
        let pinned_count = pinned.iter().filter(|p| **p).count();
        let free_total = total - min * pinned_count as f64;
        let free_weight: f64 = (0..count).filter(|&i| !pinned[i]).map(|i| weights[i]).sum();
        let free_count = (count - pinned_count) as f64;

        let mut changed = false;
        let free: Vec<usize> = (0..count).filter(|&i| !pinned[i]).collect();
        for i in free {
            let share = if free_weight > 0.0 {
                weights[i] / free_weight
            } else {
                1.0 / free_count
            };
            extents[i] = free_total * share;
            if extents[i] < min {
                extents[i] = min;
                pinned[i] = true;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
    extents
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn settings() -> LayoutSettings { LayoutSettings::default() }

    fn bounds() -> Rect { Rect::new(0.0, 0.0, 1200.0, 800.0) }

    #[test]
    fn single_window_fills_the_display() {
        let slots = make_slots(1, bounds(), &ScopeRatios::new(0.5), &settings());
        assert_eq!(slots, vec![Rect::new(8.0, 8.0, 1184.0, 784.0)]);
    }

    #[test]
    fn no_windows_no_slots() {
        assert!(make_slots(0, bounds(), &ScopeRatios::new(0.5), &settings()).is_empty());
    }

    #[test]
    fn three_windows_master_and_two_rows() {
        let slots = make_slots(3, bounds(), &ScopeRatios::new(0.5), &settings());
        assert_eq!(
            slots,
            vec![
                Rect::new(8.0, 8.0, 584.0, 784.0),
                Rect::new(608.0, 8.0, 584.0, 384.0),
                Rect::new(608.0, 408.0, 584.0, 384.0),
            ]
        );
    }

    #[test]
    fn stack_weights_shape_rows() {
        let ratios = ScopeRatios {
            master_ratio: 0.5,
            stack_weights: vec![0.75, 0.25],
        };
        let slots = make_slots(3, bounds(), &ratios, &settings());
        assert_eq!(slots[1], Rect::new(608.0, 8.0, 584.0, 584.0));
        assert_eq!(slots[2], Rect::new(608.0, 608.0, 584.0, 184.0));
    }

    #[test]
    fn mismatched_weights_fall_back_to_equal_rows() {
        let ratios = ScopeRatios {
            master_ratio: 0.5,
            stack_weights: vec![0.9, 0.1],
        };
        let slots = make_slots(4, bounds(), &ratios, &settings());
        let heights: Vec<f64> = slots[1..].iter().map(|r| r.size.height + 16.0).collect();
        assert_eq!(heights, vec![267.0, 266.0, 267.0]);
    }

    #[test]
    fn slot_count_disjoint_and_in_bounds() {
        let bounds = Rect::new(0.0, 25.0, 1440.0, 875.0);
        for ratio in [0.2, 0.37, 0.5, 0.8] {
            for n in 1..=7 {
                let ratios = ScopeRatios::new(ratio);
                let slots = make_slots(n, bounds, &ratios, &settings());
                assert_eq!(slots.len(), n);
                for (i, a) in slots.iter().enumerate() {
                    assert!(bounds.contains_rect(a), "{a:?} outside {bounds:?}");
                    for b in &slots[i + 1..] {
                        assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn rows_respect_minimum_extent() {
        let extents = resolve_extents(800.0, &[0.9, 0.05, 0.05], 120.0);
        assert_eq!(extents, vec![560.0, 120.0, 120.0]);
    }

    #[test]
    fn earlier_rows_win_when_space_is_short() {
        let extents = resolve_extents(300.0, &[1.0 / 3.0; 3], 120.0);
        assert_eq!(extents, vec![120.0, 120.0, 60.0]);
    }

    #[test]
    fn extents_sum_to_total() {
        let extents = resolve_extents(777.0, &[0.1, 0.2, 0.3, 0.4], 50.0);
        let sum: f64 = extents.iter().sum();
        assert!((sum - 777.0).abs() < 1e-9);
        assert!(extents.iter().all(|e| *e >= 50.0));
    }

    #[test]
    fn master_ratio_is_clamped() {
        let slots = make_slots(2, bounds(), &ScopeRatios::new(0.95), &settings());
        assert_eq!(slots[0], Rect::new(8.0, 8.0, 944.0, 784.0));
    }
}
