use ndarray::{ArrayView3, ArrayViewMut3};

use super::crop_window::CropWindow;

/// A single video frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps an `image` buffer, keeping the given frame index.
    pub fn from_rgb_image(img: image::RgbImage, index: usize) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels into an `image::RgbImage`.
    ///
    /// Returns `None` for frames that are not 3-channel.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Bilinear resize to `width` × `height`. Returns a clone when the size
    /// already matches.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.width == width && self.height == height {
            return self.clone();
        }
        match self.to_rgb_image() {
            Some(img) => {
                let out =
                    image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
                Frame::from_rgb_image(out, self.index)
            }
            None => self.clone(),
        }
    }

    /// Copies the pixels inside `window` into a new frame.
    ///
    /// The window is clamped to the frame; an empty intersection yields `None`.
    pub fn crop(&self, window: &CropWindow) -> Option<Frame> {
        let x0 = window.x0.clamp(0, self.width as i32) as usize;
        let x1 = window.x1.clamp(0, self.width as i32) as usize;
        let y0 = window.y0.clamp(0, self.height as i32) as usize;
        let y1 = window.y1.clamp(0, self.height as i32) as usize;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let ch = self.channels as usize;
        let stride = self.width as usize * ch;
        let row_len = (x1 - x0) * ch;
        let mut data = Vec::with_capacity(row_len * (y1 - y0));
        for row in y0..y1 {
            let start = row * stride + x0 * ch;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some(Frame::new(
            data,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
            self.channels,
            self.index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
