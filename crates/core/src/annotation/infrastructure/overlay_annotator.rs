use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

const PERSON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const ATTENTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const LINE_WIDTH: i32 = 2;
const LABEL_SCALE: f32 = 24.0;
const LABEL_MARGIN: i32 = 10;
const CAPTION_SCALE: f32 = 14.0;

/// Draws person boxes, the attention window and the current label with
/// `imageproc`. Text (the label, and each box's score and track id) needs a
/// font; without one only rectangles are drawn.
pub struct OverlayAnnotator {
    font: Option<FontVec>,
}

impl OverlayAnnotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Load a TrueType/OpenType font for label text.
    pub fn with_font_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

impl FrameAnnotator for OverlayAnnotator {
    fn annotate(&self, frame: &mut Frame, overlay: &Overlay<'_>) {
        let Some(mut img) = frame.to_rgb_image() else {
            log::debug!("Skipping overlay on {}-channel frame", frame.channels());
            return;
        };

        for det in overlay.detections {
            draw_box(
                &mut img,
                det.bbox.x1,
                det.bbox.y1,
                det.bbox.width(),
                det.bbox.height(),
                PERSON_COLOR,
            );
            if let Some(font) = self.font.as_ref() {
                let (x, y) = caption_origin(det);
                draw_text_mut(
                    &mut img,
                    PERSON_COLOR,
                    x,
                    y,
                    PxScale::from(CAPTION_SCALE),
                    font,
                    &detection_caption(det),
                );
            }
        }

        if let Some(window) = overlay.attention {
            draw_box(
                &mut img,
                window.x0,
                window.y0,
                window.width(),
                window.height(),
                ATTENTION_COLOR,
            );
        }

        if let (Some(label), Some(font)) = (overlay.label, self.font.as_ref()) {
            let text = format!("Prediction: {label}");
            let width = (text.chars().count() as f32 * LABEL_SCALE * 0.55) as u32;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(LABEL_MARGIN - 4, LABEL_MARGIN - 4)
                    .of_size(width + 8, LABEL_SCALE as u32 + 8),
                LABEL_BACKGROUND,
            );
            draw_text_mut(
                &mut img,
                LABEL_COLOR,
                LABEL_MARGIN,
                LABEL_MARGIN,
                PxScale::from(LABEL_SCALE),
                font,
                &text,
            );
        }

        frame.data_mut().copy_from_slice(img.as_raw());
    }
}

/// Confidence with two decimals, prefixed by the track id when known.
fn detection_caption(det: &Detection) -> String {
    match det.track_id {
        Some(id) => format!("#{id} {:.2}", det.confidence),
        None => format!("{:.2}", det.confidence),
    }
}

/// Just above the box's top-left corner, or inside it at the frame top.
fn caption_origin(det: &Detection) -> (i32, i32) {
    let y = det.bbox.y1 - CAPTION_SCALE as i32 - 2;
    (det.bbox.x1.max(0), if y < 0 { det.bbox.y1.max(0) + 2 } else { y })
}

/// Hollow rectangle `LINE_WIDTH` pixels thick, drawn inward.
fn draw_box(img: &mut RgbImage, x: i32, y: i32, width: i32, height: i32, color: Rgb<u8>) {
    for inset in 0..LINE_WIDTH {
        let w = width - 2 * inset;
        let h = height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(x + inset, y + inset).of_size(w as u32, h as u32),
            color,
        );
    }
}
