/// ByteTrack-style identity assignment for person detections.
///
/// High-confidence detections are associated with live tracks first; the
/// remaining tracks then get a chance at low-confidence detections, so a
/// person whose score dips for a few frames keeps their id. Only
/// high-confidence leftovers open new tracks.
use std::collections::HashSet;

use crate::shared::detection::Detection;

use super::math::bbox_iou;

const HIGH_THRESH: f32 = 0.5;
const MATCH_THRESH: f64 = 0.3;

#[derive(Clone, Debug)]
struct Track {
    id: u32,
    bbox: [f64; 4],
    frames_lost: usize,
}

pub struct ByteTracker {
    tracks: Vec<Track>,
    next_id: u32,
    max_lost: usize,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Number of tracks still remembered, including temporarily lost ones.
    pub fn live_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Writes `track_id` on every detection that was associated with (or
    /// started) a track. Unassociated low-confidence detections get `None`.
    pub fn assign_ids(&mut self, detections: &mut [Detection]) {
        let boxes: Vec<[f64; 4]> = detections.iter().map(as_array).collect();
        let (high, low): (Vec<usize>, Vec<usize>) =
            (0..detections.len()).partition(|&i| detections[i].confidence >= HIGH_THRESH);

        let mut assigned: Vec<Option<u32>> = vec![None; detections.len()];
        let mut matched_tracks: HashSet<usize> = HashSet::new();

        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        for (ti, di) in self.greedy_match(&all_tracks, &high, &boxes) {
            self.refresh(ti, boxes[di]);
            matched_tracks.insert(ti);
            assigned[di] = Some(self.tracks[ti].id);
        }

        let unmatched: Vec<usize> = all_tracks
            .iter()
            .copied()
            .filter(|ti| !matched_tracks.contains(ti))
            .collect();
        for (ti, di) in self.greedy_match(&unmatched, &low, &boxes) {
            self.refresh(ti, boxes[di]);
            matched_tracks.insert(ti);
            assigned[di] = Some(self.tracks[ti].id);
        }

        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if !matched_tracks.contains(&ti) {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        for &di in &high {
            if assigned[di].is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(Track {
                    id,
                    bbox: boxes[di],
                    frames_lost: 0,
                });
                assigned[di] = Some(id);
            }
        }

        for (det, id) in detections.iter_mut().zip(assigned) {
            det.track_id = id;
        }
    }

    fn refresh(&mut self, track_idx: usize, bbox: [f64; 4]) {
        let track = &mut self.tracks[track_idx];
        track.bbox = bbox;
        track.frames_lost = 0;
    }

    /// Greedy IoU matching: candidate pairs sorted by descending IoU, each
    /// track and detection used at most once.
    fn greedy_match(
        &self,
        track_indices: &[usize],
        det_indices: &[usize],
        boxes: &[[f64; 4]],
    ) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for &ti in track_indices {
            for &di in det_indices {
                let iou = bbox_iou(&self.tracks[ti].bbox, &boxes[di]);
                if iou >= MATCH_THRESH {
                    pairs.push((ti, di, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut used_tracks = HashSet::new();
        let mut used_dets = HashSet::new();
        pairs
            .into_iter()
            .filter(|(ti, di, _)| {
                if used_tracks.contains(ti) || used_dets.contains(di) {
                    return false;
                }
                used_tracks.insert(*ti);
                used_dets.insert(*di);
                true
            })
            .map(|(ti, di, _)| (ti, di))
            .collect()
    }
}

fn as_array(det: &Detection) -> [f64; 4] {
    [
        det.bbox.x1 as f64,
        det.bbox.y1 as f64,
        det.bbox.x2 as f64,
        det.bbox.y2 as f64,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detection::{BoundingBox, PERSON_CLASS_ID};

    fn det(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            confidence,
            class_id: PERSON_CLASS_ID,
            track_id: None,
        }
    }

    #[test]
    fn test_new_detections_get_unique_ids() {
        let mut tracker = ByteTracker::new(5);
        let mut dets = vec![det(0, 0, 50, 50, 0.9), det(100, 100, 150, 150, 0.8)];
        tracker.assign_ids(&mut dets);

        assert!(dets[0].track_id.is_some());
        assert!(dets[1].track_id.is_some());
        assert_ne!(dets[0].track_id, dets[1].track_id);
    }

    #[test]
    fn test_consistent_id_across_frames() {
        let mut tracker = ByteTracker::new(5);
        let mut first = vec![det(10, 10, 60, 60, 0.9)];
        tracker.assign_ids(&mut first);

        let mut second = vec![det(12, 12, 62, 62, 0.9)];
        tracker.assign_ids(&mut second);
        assert_eq!(second[0].track_id, first[0].track_id);
    }

    #[test]
    fn test_lost_track_is_forgotten() {
        let mut tracker = ByteTracker::new(2);
        tracker.assign_ids(&mut [det(10, 10, 60, 60, 0.9)]);
        for _ in 0..3 {
            tracker.assign_ids(&mut []);
        }
        assert_eq!(tracker.live_tracks(), 0);
    }

    #[test]
    fn test_track_survives_within_max_lost() {
        let mut tracker = ByteTracker::new(3);
        let mut first = vec![det(10, 10, 60, 60, 0.9)];
        tracker.assign_ids(&mut first);
        tracker.assign_ids(&mut []);
        tracker.assign_ids(&mut []);

        let mut later = vec![det(12, 12, 62, 62, 0.9)];
        tracker.assign_ids(&mut later);
        assert_eq!(later[0].track_id, first[0].track_id);
    }

    #[test]
    fn test_low_confidence_keeps_existing_track() {
        let mut tracker = ByteTracker::new(5);
        let mut first = vec![det(10, 10, 60, 60, 0.9)];
        tracker.assign_ids(&mut first);

        let mut weak = vec![det(12, 12, 62, 62, 0.3)];
        tracker.assign_ids(&mut weak);
        assert_eq!(weak[0].track_id, first[0].track_id);
    }

    #[test]
    fn test_low_confidence_does_not_start_track() {
        let mut tracker = ByteTracker::new(5);
        let mut weak = vec![det(10, 10, 60, 60, 0.3)];
        tracker.assign_ids(&mut weak);
        assert_eq!(weak[0].track_id, None);
        assert_eq!(tracker.live_tracks(), 0);
    }

    #[test]
    fn test_two_people_keep_their_ids() {
        let mut tracker = ByteTracker::new(5);
        let mut first = vec![det(0, 0, 50, 50, 0.9), det(200, 200, 250, 250, 0.9)];
        tracker.assign_ids(&mut first);

        // Listed in the opposite order on the next frame.
        let mut second = vec![det(202, 202, 252, 252, 0.9), det(2, 2, 52, 52, 0.9)];
        tracker.assign_ids(&mut second);

        assert_eq!(second[0].track_id, first[1].track_id);
        assert_eq!(second[1].track_id, first[0].track_id);
    }
}
