/// VideoMAE action classifier using ONNX Runtime via `ort`.
///
/// Expects a model directory holding `model.onnx` and the Hugging Face
/// `config.json` whose `id2label` names the classes.
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::classification::domain::action_classifier::{
    argmax, fit_clip, ActionClassifier, ClassifierError,
};
use crate::detection::infrastructure::execution_provider::open_session;
use crate::shared::constants::{CLASSIFIER_CONFIG_FILE, CLASSIFIER_MODEL_FILE, DEFAULT_BATCH_SIZE};
use crate::shared::frame::Frame;

use super::model_config::ModelConfig;

const DEFAULT_IMAGE_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct OnnxVideoMaeClassifier {
    session: ort::session::Session,
    config: ModelConfig,
    clip_len: usize,
    image_size: u32,
}

impl OnnxVideoMaeClassifier {
    pub fn from_dir(model_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Self::new(
            &model_dir.join(CLASSIFIER_MODEL_FILE),
            &model_dir.join(CLASSIFIER_CONFIG_FILE),
        )
    }

    pub fn new(model_path: &Path, config_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = ModelConfig::load(config_path)?;
        let session = open_session(model_path)?;

        // Input is [N, T, C, H, W]; a fixed T wins over the config.
        let fixed_frames = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                (shape.len() == 5 && shape[1] > 0).then(|| shape[1] as usize)
            } else {
                None
            }
        });
        let clip_len = fixed_frames
            .or(config.num_frames)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let image_size = config.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);

        log::info!(
            "Action classifier ready: {} ({} labels, {clip_len} frames at {image_size}px)",
            model_path.display(),
            config.num_labels()
        );

        Ok(Self {
            session,
            config,
            clip_len,
            image_size,
        })
    }

    pub fn clip_len(&self) -> usize {
        self.clip_len
    }
}

impl ActionClassifier for OnnxVideoMaeClassifier {
    fn classify(&mut self, frames: &[Frame]) -> Result<String, Box<dyn std::error::Error>> {
        let clip = fit_clip(frames, self.clip_len)?;
        let input = preprocess_clip(&clip, self.image_size)?;

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err(ClassifierError::BadOutput("model produced no outputs".into()).into());
        }
        let logits: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();

        let class_id = argmax(&logits)?;
        let label = self
            .config
            .label(class_id)
            .ok_or(ClassifierError::UnknownLabel(class_id))?;
        log::debug!("Clip classified as {label} (class {class_id})");
        Ok(label.to_string())
    }
}

/// Build the `[1, T, 3, size, size]` input: shortest edge resized to `size`,
/// centre-cropped, scaled to [0, 1] and normalized with ImageNet statistics.
fn preprocess_clip(clip: &[Frame], size: u32) -> Result<ndarray::Array5<f32>, ClassifierError> {
    let s = size as usize;
    let mut tensor = ndarray::Array5::<f32>::zeros((1, clip.len(), 3, s, s));

    for (t, frame) in clip.iter().enumerate() {
        let img = frame
            .to_rgb_image()
            .ok_or(ClassifierError::UnsupportedFrame(frame.channels()))?;
        let prepared = center_crop(&resize_shortest_edge(&img, size), size);
        for (x, y, pixel) in prepared.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                tensor[[0, t, c, y as usize, x as usize]] =
                    (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }
    Ok(tensor)
}

/// Scale so the shorter side equals `size`, keeping the aspect ratio.
fn resize_shortest_edge(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = if w <= h {
        (size, ((h as u64 * size as u64) / w.max(1) as u64) as u32)
    } else {
        (((w as u64 * size as u64) / h.max(1) as u64) as u32, size)
    };
    imageops::resize(img, new_w.max(size), new_h.max(size), FilterType::Triangle)
}

fn center_crop(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let left = w.saturating_sub(size) / 2;
    let top = h.saturating_sub(size) / 2;
    imageops::crop_imm(img, left, top, size.min(w), size.min(h)).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, 3, 0)
    }

    #[test]
    fn test_resize_shortest_edge_portrait() {
        let img = RgbImage::new(160, 320);
        let out = resize_shortest_edge(&img, 224);
        assert_eq!(out.dimensions(), (224, 448));
    }

    #[test]
    fn test_resize_shortest_edge_landscape() {
        let img = RgbImage::new(320, 170);
        let out = resize_shortest_edge(&img, 224);
        assert_eq!(out.dimensions().1, 224);
        assert_eq!(out.dimensions().0, 421);
    }

    #[test]
    fn test_center_crop_takes_middle() {
        let mut img = RgbImage::new(300, 224);
        img.put_pixel(150, 112, image::Rgb([255, 0, 0]));
        let out = center_crop(&img, 224);
        assert_eq!(out.dimensions(), (224, 224));
        // left offset is (300 - 224) / 2 = 38
        assert_eq!(out.get_pixel(112, 112), &image::Rgb([255, 0, 0]));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let clip = vec![solid(320, 320, 255), solid(170, 320, 0)];
        let tensor = preprocess_clip(&clip, 224).unwrap();

        assert_eq!(tensor.shape(), &[1, 2, 3, 224, 224]);
        for c in 0..3 {
            assert_relative_eq!(
                tensor[[0, 0, c, 100, 100]],
                (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
                epsilon = 1e-4
            );
            assert_relative_eq!(
                tensor[[0, 1, c, 0, 0]],
                -IMAGENET_MEAN[c] / IMAGENET_STD[c],
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn test_preprocess_rejects_grayscale() {
        let gray = Frame::new(vec![0u8; 16], 4, 4, 1, 0);
        assert!(matches!(
            preprocess_clip(&[gray], 224),
            Err(ClassifierError::UnsupportedFrame(1))
        ));
    }
}
