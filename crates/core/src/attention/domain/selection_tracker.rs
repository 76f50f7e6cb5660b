use crate::shared::constants::{DEFAULT_DISPLACEMENT_THRESHOLD, DEFAULT_MAX_GROUP_SIZE};
use crate::shared::detection::Point;

use super::grouping::Group;

/// Per-session selection memory, owned by one pipeline instance and
/// threaded through every [`SelectionTracker::select`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionTrackerState {
    /// Last accepted group centroid, the anchor for the displacement check.
    pub previous_center: Option<Point>,
    /// Subject chosen for the most recent frame. Persists across frames
    /// with no groups until a nearby group replaces it.
    pub selected: Option<Point>,
}

impl SelectionTrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.previous_center = None;
        self.selected = None;
    }
}

/// Picks the group of interest across frames with hysteresis.
///
/// Groups are visited in order. Groups under two people are not subjects.
/// Larger groups are cut to their earliest `max_group_size` members and
/// reduced to the truncated mean of their centroids. A centroid further
/// than `displacement_threshold` from the previous subject is rejected;
/// otherwise it becomes the new subject. Every accepted group overwrites
/// the one before it, so the last accepted group in a frame wins.
#[derive(Clone, Debug)]
pub struct SelectionTracker {
    displacement_threshold: f64,
    max_group_size: usize,
}

impl SelectionTracker {
    pub fn new(displacement_threshold: f64, max_group_size: usize) -> Self {
        Self {
            displacement_threshold,
            max_group_size: max_group_size.max(2),
        }
    }

    /// Updates `state` from this frame's groups and returns the subject.
    pub fn select(
        &self,
        state: &mut SelectionTrackerState,
        groups: &[Group],
        centroids: &[Point],
    ) -> Option<Point> {
        let mut selected = state.selected.or(state.previous_center);

        for group in groups {
            if group.len() < 2 {
                if state.previous_center.is_some() {
                    selected = state.previous_center;
                }
                continue;
            }

            let members = &group[..group.len().min(self.max_group_size)];
            let candidate = mean_point(members.iter().map(|&idx| centroids[idx]));

            if let Some(prev) = state.previous_center {
                if candidate.distance(&prev) > self.displacement_threshold {
                    log::trace!(
                        "Rejected group at ({}, {}): too far from ({}, {})",
                        candidate.x,
                        candidate.y,
                        prev.x,
                        prev.y
                    );
                    selected = Some(prev);
                    continue;
                }
            }

            state.previous_center = Some(candidate);
            selected = Some(candidate);
        }

        state.selected = selected;
        selected
    }
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLACEMENT_THRESHOLD, DEFAULT_MAX_GROUP_SIZE)
    }
}

/// Mean of the points, each axis truncated toward zero.
fn mean_point(points: impl Iterator<Item = Point>) -> Point {
    let (mut sx, mut sy, mut n) = (0i64, 0i64, 0i64);
    for p in points {
        sx += p.x as i64;
        sy += p.y as i64;
        n += 1;
    }
    if n == 0 {
        return Point::new(0, 0);
    }
    Point::new((sx / n) as i32, (sy / n) as i32)
}
