//! MJPEG stream encoding.
//!
//! Each annotated frame becomes one JPEG part of a
//! `multipart/x-mixed-replace` response, delimited by a fixed boundary.

use bytes::{BufMut, Bytes, BytesMut};
use image::{codecs::jpeg::JpegEncoder, RgbImage};

use crate::error::Result;

pub const BOUNDARY: &str = "frame";

/// Content type of the whole streaming response.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

#[derive(Debug, Clone)]
pub struct StreamEncoder {
    quality: u8,
}

impl StreamEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    pub fn encode_jpeg(&self, frame: &RgbImage) -> Result<Vec<u8>> {
        let mut jpeg = Vec::with_capacity(frame.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(frame)?;
        Ok(jpeg)
    }

    /// JPEG-encode `frame` and wrap it as one multipart part.
    pub fn encode_part(&self, frame: &RgbImage) -> Result<Bytes> {
        let jpeg = self.encode_jpeg(frame)?;
        Ok(multipart_part(&jpeg))
    }
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

/// `--frame` header, per-part content type and length, payload, trailing CRLF.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
