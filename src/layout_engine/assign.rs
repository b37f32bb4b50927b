use crate::common::collections::HashSet;
use crate::model::{Rect, Window, WindowId};

/// Greedy nearest-neighbour matching of windows to slots.
///
/// Every (slot, window) pair is ranked by the distance between their
/// centres, ties broken by slot index and then window id, and pairs are
/// accepted in that order while both sides are still free. The result is
/// injective and has `min(slots, windows)` entries, sorted by slot.
pub fn assign_windows_to_nearest_slots(slots: &[Rect], windows: &[Window]) -> Vec<(usize, WindowId)> {
    let mut pairs: Vec<(f64, usize, WindowId)> = Vec::with_capacity(slots.len() * windows.len());
    for (slot_idx, slot) in slots.iter().enumerate() {
        for window in windows {
            pairs.push((slot.center_distance(&window.frame), slot_idx, window.id));
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let wanted = slots.len().min(windows.len());
    let mut used_slots = HashSet::default();
    let mut used_windows = HashSet::default();
    let mut result = Vec::with_capacity(wanted);
    for (_, slot, window) in pairs {
        if result.len() == wanted {
            break;
        }
        if used_slots.contains(&slot) || used_windows.contains(&window) {
            continue;
        }
        used_slots.insert(slot);
        used_windows.insert(window);
        result.push((slot, window));
    }
    result.sort_by_key(|(slot, _)| *slot);
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::platform::testing::make_window;

    fn grid(n: usize) -> Vec<Rect> {
        (0..n).map(|i| Rect::new(i as f64 * 100.0, 0.0, 90.0, 90.0)).collect()
    }

    #[test]
    fn windows_land_on_the_nearest_slot() {
        let slots = grid(3);
        let windows = vec![
            make_window(1, 1, Rect::new(210.0, 5.0, 80.0, 80.0)),
            make_window(2, 1, Rect::new(0.0, 0.0, 90.0, 90.0)),
            make_window(3, 1, Rect::new(95.0, 0.0, 90.0, 90.0)),
        ];
        let result = assign_windows_to_nearest_slots(&slots, &windows);
        assert_eq!(
            result,
            vec![(0, WindowId::new(2)), (1, WindowId::new(3)), (2, WindowId::new(1))]
        );
    }

    #[test]
    fn ties_go_to_the_lower_window_id() {
        let slots = grid(1);
        let frame = Rect::new(0.0, 0.0, 90.0, 90.0);
        let windows = vec![make_window(9, 1, frame), make_window(4, 1, frame)];
        let result = assign_windows_to_nearest_slots(&slots, &windows);
        assert_eq!(result, vec![(0, WindowId::new(4))]);
    }

    #[test]
    fn matching_is_injective() {
        for slot_count in 0..6 {
            for window_count in 0..6 {
                let slots = grid(slot_count);
                // Stack every window on the same spot to force contention.
                let windows: Vec<_> = (0..window_count)
                    .map(|i| make_window(i as u32 + 1, 1, Rect::new(40.0, 0.0, 90.0, 90.0)))
                    .collect();
                let result = assign_windows_to_nearest_slots(&slots, &windows);
                assert_eq!(result.len(), slot_count.min(window_count));

                let slots_used: HashSet<_> = result.iter().map(|(s, _)| *s).collect();
                let windows_used: HashSet<_> = result.iter().map(|(_, w)| *w).collect();
                assert_eq!(slots_used.len(), result.len());
                assert_eq!(windows_used.len(), result.len());
            }
        }
    }
}
