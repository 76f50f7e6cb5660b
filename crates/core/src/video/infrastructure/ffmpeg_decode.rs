//! Decoding loop shared by the file and camera readers.

use crate::shared::frame::Frame;

type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Stream facts read when the decoder is opened.
pub(super) struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
}

/// Decoder for the best video stream of an input, converting to RGB24.
pub(super) struct RgbDecoder {
    decoder: ffmpeg_next::decoder::Video,
    // Built on the first decoded frame; capture devices may only settle
    // their pixel format once data flows.
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    stream_index: usize,
}

impl RgbDecoder {
    pub fn open(
        ictx: &ffmpeg_next::format::context::Input,
    ) -> Result<(Self, StreamInfo), Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let rate = if rate.denominator() != 0 && rate.numerator() > 0 {
            rate
        } else {
            stream.rate()
        };
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };

        Ok((
            Self {
                decoder,
                scaler: None,
                stream_index: stream.index(),
            },
            info,
        ))
    }

    pub fn frames<'a>(
        &'a mut self,
        ictx: &'a mut ffmpeg_next::format::context::Input,
    ) -> DecodedFrames<'a> {
        DecodedFrames {
            ictx,
            decoder: self,
            next_index: 0,
            flushing: false,
            done: false,
        }
    }

    fn receive(&mut self, index: usize) -> Option<FrameResult> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;
        Some(self.to_rgb(&decoded, index))
    }

    fn to_rgb(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
        index: usize,
    ) -> FrameResult {
        let (width, height) = (decoded.width(), decoded.height());
        if self.scaler.is_none() {
            self.scaler = Some(ffmpeg_next::software::scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?);
        }
        let scaler = self.scaler.as_mut().ok_or("RGB scaler unavailable")?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(decoded, &mut rgb_frame)?;
        let pixels = packed_rgb(&rgb_frame, width, height);
        Ok(Frame::new(pixels, width, height, 3, index))
    }
}

/// Lazily decodes one frame per `next` call.
pub(super) struct DecodedFrames<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: &'a mut RgbDecoder,
    next_index: usize,
    flushing: bool,
    done: bool,
}

impl DecodedFrames<'_> {
    fn emit(&mut self) -> Option<FrameResult> {
        let result = self.decoder.receive(self.next_index)?;
        self.next_index += 1;
        Some(result)
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.emit() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.decoder.send_eof();
                self.flushing = true;
                let result = self.emit();
                self.done = result.is_none();
                return result;
            };
            if stream.index() != self.decoder.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(result) = self.emit() {
                return Some(result);
            }
        }
    }
}

/// Copies an RGB24 ffmpeg frame into a tightly packed buffer, dropping the
/// per-row stride padding.
fn packed_rgb(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
