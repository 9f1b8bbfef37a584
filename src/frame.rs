//! Camera image wire model and the pixel codec bridge.
//!
//! Images travel as JSON `ImageMessage`s laid out like sensor_msgs/Image.
//! Annotation works on a BGR `ImageBuffer`; this module converts between the
//! two. The header is never interpreted, only carried from input to output.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Working buffer for annotation. Pixels are stored in B, G, R order.
pub type BgrImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    #[serde(default)]
    pub sec: i32,
    #[serde(default)]
    pub nanosec: u32,
}

/// Timing and frame identity of a message. Opaque to this crate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Time,
    #[serde(default)]
    pub frame_id: String,
}

/// sensor_msgs/Image
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMessage {
    #[serde(default)]
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    #[serde(default)]
    pub is_bigendian: u8,
    /// Row length in bytes. Zero means tightly packed.
    #[serde(default)]
    pub step: u32,
    pub data: Vec<u8>,
}

impl ImageMessage {
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).context("parse image message")
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("serialize image message")
    }
}

/// Pixel encodings accepted on input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelEncoding {
    Bgr8,
    Rgb8,
    Bgra8,
    Rgba8,
    Mono8,
}

impl PixelEncoding {
    pub fn channels(&self) -> usize {
        match self {
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Mono8 => 1,
        }
    }

    fn to_bgr(self, px: &[u8]) -> [u8; 3] {
        match self {
            Self::Bgr8 | Self::Bgra8 => [px[0], px[1], px[2]],
            Self::Rgb8 | Self::Rgba8 => [px[2], px[1], px[0]],
            Self::Mono8 => [px[0], px[0], px[0]],
        }
    }
}

impl FromStr for PixelEncoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bgr8" => Ok(Self::Bgr8),
            "rgb8" => Ok(Self::Rgb8),
            "bgra8" => Ok(Self::Bgra8),
            "rgba8" => Ok(Self::Rgba8),
            "mono8" | "8uc1" => Ok(Self::Mono8),
            other => Err(anyhow!("unsupported image encoding '{}'", other)),
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bgr8 => "bgr8",
            Self::Rgb8 => "rgb8",
            Self::Bgra8 => "bgra8",
            Self::Rgba8 => "rgba8",
            Self::Mono8 => "mono8",
        };
        f.write_str(name)
    }
}

/// Decode a wire image into a BGR working buffer.
///
/// Row padding (`step` larger than a row) is skipped.
pub fn decode_bgr8(msg: &ImageMessage) -> Result<BgrImage> {
    let encoding: PixelEncoding = msg.encoding.parse()?;
    if msg.width == 0 || msg.height == 0 {
        return Err(anyhow!(
            "image has zero dimension ({}x{})",
            msg.width,
            msg.height
        ));
    }

    let channels = encoding.channels();
    let width = msg.width as usize;
    let height = msg.height as usize;
    let row_bytes = width * channels;
    let step = if msg.step == 0 {
        row_bytes
    } else {
        msg.step as usize
    };
    if step < row_bytes {
        return Err(anyhow!(
            "image step {} shorter than row of {} bytes",
            step,
            row_bytes
        ));
    }
    let needed = step * (height - 1) + row_bytes;
    if msg.data.len() < needed {
        return Err(anyhow!(
            "image data too short: {} bytes, expected at least {}",
            msg.data.len(),
            needed
        ));
    }

    let mut bgr = Vec::with_capacity(width * height * 3);
    for row in msg.data.chunks(step).take(height) {
        for px in row[..row_bytes].chunks_exact(channels) {
            bgr.extend_from_slice(&encoding.to_bgr(px));
        }
    }

    BgrImage::from_raw(msg.width, msg.height, bgr)
        .ok_or_else(|| anyhow!("decoded buffer does not match {}x{}", msg.width, msg.height))
}

/// Encode a working buffer as a tightly packed `bgr8` message.
pub fn encode_bgr8(image: &BgrImage, header: &Header) -> Result<ImageMessage> {
    let (width, height) = image.dimensions();
    let step = width
        .checked_mul(3)
        .ok_or_else(|| anyhow!("image row too wide to encode: {} pixels", width))?;
    Ok(ImageMessage {
        header: header.clone(),
        height,
        width,
        encoding: PixelEncoding::Bgr8.to_string(),
        is_bigendian: 0,
        step,
        data: image.as_raw().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(encoding: &str, width: u32, height: u32, step: u32, data: Vec<u8>) -> ImageMessage {
        ImageMessage {
            header: Header {
                stamp: Time {
                    sec: 42,
                    nanosec: 7,
                },
                frame_id: "cam".to_string(),
            },
            height,
            width,
            encoding: encoding.to_string(),
            is_bigendian: 0,
            step,
            data,
        }
    }

    #[test]
    fn rgb8_is_swapped_to_bgr() {
        let msg = message("rgb8", 2, 1, 6, vec![1, 2, 3, 4, 5, 6]);
        let img = decode_bgr8(&msg).unwrap();
        assert_eq!(img.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn mono8_is_expanded() {
        let msg = message("mono8", 2, 1, 2, vec![9, 200]);
        let img = decode_bgr8(&msg).unwrap();
        assert_eq!(img.as_raw(), &vec![9, 9, 9, 200, 200, 200]);
    }

    #[test]
    fn row_padding_is_skipped() {
        // 1 pixel wide, 2 rows, 4-byte step with one padding byte per row.
        let msg = message("bgr8", 1, 2, 4, vec![1, 2, 3, 0xEE, 4, 5, 6, 0xEE]);
        let img = decode_bgr8(&msg).unwrap();
        assert_eq!(img.as_raw(), &vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let msg = message("rgba8", 1, 1, 0, vec![10, 20, 30, 255]);
        let img = decode_bgr8(&msg).unwrap();
        assert_eq!(img.as_raw(), &vec![30, 20, 10]);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(decode_bgr8(&message("yuv422", 1, 1, 2, vec![0, 0])).is_err());
        assert!(decode_bgr8(&message("bgr8", 0, 1, 0, vec![])).is_err());
        assert!(decode_bgr8(&message("bgr8", 2, 2, 6, vec![0; 11])).is_err());
        let err = decode_bgr8(&message("bgr8", 2, 1, 3, vec![0; 6])).unwrap_err();
        assert!(err.to_string().contains("step"));
    }

    #[test]
    fn encode_keeps_header_and_packs_rows() {
        let msg = message("rgb8", 2, 1, 6, vec![1, 2, 3, 4, 5, 6]);
        let img = decode_bgr8(&msg).unwrap();
        let out = encode_bgr8(&img, &msg.header).unwrap();
        assert_eq!(out.header, msg.header);
        assert_eq!(out.encoding, "bgr8");
        assert_eq!(out.step, 6);
        assert_eq!(out.data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn image_message_json_defaults() {
        let json = br#"{"height": 1, "width": 1, "encoding": "bgr8", "data": [1, 2, 3]}"#;
        let msg = ImageMessage::from_json(json).unwrap();
        assert_eq!(msg.header, Header::default());
        assert_eq!(msg.step, 0);
        assert!(decode_bgr8(&msg).is_ok());
    }
}
