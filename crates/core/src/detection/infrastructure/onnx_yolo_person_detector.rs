/// YOLOv8 person detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, person filtering, NMS and
/// ByteTrack identity assignment. Boxes come back in frame pixels.
use std::path::Path;

use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::detection::{BoundingBox, Detection, PERSON_CLASS_ID};
use crate::shared::frame::Frame;

use super::bytetrack_tracker::ByteTracker;
use super::execution_provider::{open_session, square_input_size};
use super::math::nms;

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// Box geometry (`cx, cy, w, h`) precedes the per-class scores in each row.
const BOX_FEATURES: usize = 4;

pub struct OnnxYoloPersonDetector {
    session: ort::session::Session,
    tracker: ByteTracker,
    confidence: f32,
    input_size: u32,
}

impl OnnxYoloPersonDetector {
    pub fn new(
        model_path: &Path,
        tracker: ByteTracker,
        confidence: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let input_size = square_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        log::info!(
            "Person detector ready: {} (input {input_size}px, confidence > {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            tracker,
            confidence,
            input_size,
        })
    }
}

impl PersonDetector for OnnxYoloPersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (input_tensor, letterboxed) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data: Vec<f32> = tensor.iter().copied().collect();

        let candidates = parse_person_rows(&data, &shape, self.confidence)?;
        let boxes: Vec<[f64; 4]> = candidates
            .iter()
            .map(|c| letterboxed.to_frame_coords(c.bbox, frame.width(), frame.height()))
            .collect();
        let scores: Vec<f64> = candidates.iter().map(|c| c.score as f64).collect();

        let mut detections: Vec<Detection> = nms(&boxes, &scores, NMS_IOU_THRESH)
            .into_iter()
            .map(|i| Detection {
                bbox: pixel_box(&boxes[i]),
                confidence: candidates[i].score,
                class_id: PERSON_CLASS_ID,
                track_id: None,
            })
            .collect();

        self.tracker.assign_ids(&mut detections);
        Ok(detections)
    }
}

/// Truncates frame-space corners to whole pixels. Corners are already
/// clamped to the frame, so truncation never goes negative.
fn pixel_box(b: &[f64; 4]) -> BoundingBox {
    BoundingBox::new(b[0] as i32, b[1] as i32, b[2] as i32, b[3] as i32)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterboxed {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    /// Map a `cx, cy, w, h` box in model space to `x1, y1, x2, y2` in the
    /// source frame, clamped to its bounds.
    fn to_frame_coords(&self, bbox: [f32; 4], frame_w: u32, frame_h: u32) -> [f64; 4] {
        let [cx, cy, w, h] = bbox.map(|v| v as f64);
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        [
            (((cx - w / 2.0) - px) / self.scale).clamp(0.0, fw),
            (((cy - h / 2.0) - py) / self.scale).clamp(0.0, fh),
            (((cx + w / 2.0) - px) / self.scale).clamp(0.0, fw),
            (((cy + h / 2.0) - py) / self.scale).clamp(0.0, fh),
        ]
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float tensor, padding with YOLO grey.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterboxed) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterboxed {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
struct Candidate {
    /// `cx, cy, w, h` in model input pixels.
    bbox: [f32; 4],
    score: f32,
}

/// Keep rows whose best class is "person" with a score strictly above
/// `confidence`.
///
/// YOLOv8 exports `[1, 4 + classes, anchors]`; some exports are transposed
/// to `[1, anchors, 4 + classes]`. The smaller axis is the feature axis.
fn parse_person_rows(
    data: &[f32],
    shape: &[usize],
    confidence: f32,
) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_rows, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_FEATURES {
        return Err(format!("YOLO output has no class scores: {shape:?}").into());
    }
    if data.len() < num_rows * num_feats {
        return Err("YOLO output is shorter than its shape".into());
    }

    let at = |row: usize, feat: usize| {
        if transposed {
            data[feat * num_rows + row]
        } else {
            data[row * num_feats + feat]
        }
    };

    let person_feat = BOX_FEATURES + PERSON_CLASS_ID as usize;
    let mut candidates = Vec::new();
    for row in 0..num_rows {
        let person = at(row, person_feat);
        if person <= confidence {
            continue;
        }
        let best_other = (BOX_FEATURES..num_feats)
            .filter(|&f| f != person_feat)
            .map(|f| at(row, f))
            .fold(f32::NEG_INFINITY, f32::max);
        if best_other > person {
            continue;
        }
        candidates.push(Candidate {
            bbox: [at(row, 0), at(row, 1), at(row, 2), at(row, 3)],
            score: person,
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 0.01);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_to_frame_coords_undoes_letterbox() {
        let frame = Frame::new(vec![0u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (_, lb) = letterbox(&frame, 640);
        // Centre of the model input is the centre of the frame.
        let b = lb.to_frame_coords([320.0, 320.0, 64.0, 32.0], 200, 100);
        assert_relative_eq!(b[0], 90.0, epsilon = 1e-6);
        assert_relative_eq!(b[1], 45.0, epsilon = 1e-6);
        assert_relative_eq!(b[2], 110.0, epsilon = 1e-6);
        assert_relative_eq!(b[3], 55.0, epsilon = 1e-6);
    }

    #[test]
    fn test_to_frame_coords_clamps() {
        let frame = Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0);
        let (_, lb) = letterbox(&frame, 640);
        let b = lb.to_frame_coords([0.0, 0.0, 100.0, 100.0], 100, 100);
        assert_eq!(b[0], 0.0);
        assert_eq!(b[1], 0.0);
    }

    /// Row-major `[1, anchors, 4 + 3 classes]`.
    fn rows(rows: &[[f32; 7]]) -> (Vec<f32>, Vec<usize>) {
        let data = rows.iter().flatten().copied().collect();
        (data, vec![1, rows.len().max(8), 7])
    }

    #[test]
    fn test_parse_keeps_confident_people_only() {
        let mut input = vec![
            [10.0, 10.0, 4.0, 4.0, 0.9, 0.1, 0.0],
            [20.0, 20.0, 4.0, 4.0, 0.4, 0.0, 0.0],
            [30.0, 30.0, 4.0, 4.0, 0.6, 0.8, 0.0],
        ];
        input.resize(8, [0.0; 7]);
        let (data, shape) = rows(&input);

        let found = parse_person_rows(&data, &shape, 0.5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox, [10.0, 10.0, 4.0, 4.0]);
        assert_relative_eq!(found[0].score, 0.9);
    }

    #[test]
    fn test_parse_threshold_is_strict() {
        let mut input = vec![[10.0, 10.0, 4.0, 4.0, 0.5, 0.0, 0.0]];
        input.resize(8, [0.0; 7]);
        let (data, shape) = rows(&input);
        assert!(parse_person_rows(&data, &shape, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_transposed_layout() {
        // [1, 5 features, 6 anchors]: feature-major.
        let num_rows = 6;
        let mut data = vec![0.0f32; 5 * num_rows];
        let set = |data: &mut Vec<f32>, feat: usize, row: usize, v: f32| {
            data[feat * num_rows + row] = v;
        };
        set(&mut data, 0, 2, 50.0);
        set(&mut data, 1, 2, 60.0);
        set(&mut data, 2, 2, 8.0);
        set(&mut data, 3, 2, 16.0);
        set(&mut data, 4, 2, 0.95);

        let found = parse_person_rows(&data, &[1, 5, num_rows], 0.5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox, [50.0, 60.0, 8.0, 16.0]);
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(parse_person_rows(&[0.0; 4], &[4], 0.5).is_err());
        assert!(parse_person_rows(&[0.0; 32], &[1, 4, 8], 0.5).is_err());
    }

    #[test]
    fn test_pixel_box_truncates() {
        let bbox = pixel_box(&[10.7, 20.2, 50.9, 80.99]);
        assert_eq!(bbox, BoundingBox::new(10, 20, 50, 80));
    }

    #[test]
    fn test_pixel_box_centroid_uses_truncated_corners() {
        let bbox = pixel_box(&[99.6, 0.0, 140.6, 10.0]);
        assert_eq!((bbox.x1, bbox.x2), (99, 140));
        assert_eq!(bbox.center().x, 119);
    }
}
