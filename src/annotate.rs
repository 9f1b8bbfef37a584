//! Overlay rendering: burn cached person boxes and labels into camera frames.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionBatch, PixelBox};
use crate::frame::{decode_bgr8, encode_bgr8, BgrImage, ImageMessage};

/// Box and label colour. Green reads the same in BGR and RGB order.
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// Rectangle outline thickness in pixels.
pub const STROKE_WIDTH: i32 = 2;

/// Label glyph height in pixels.
pub const LABEL_SCALE: f32 = 18.0;

/// Gap between the bottom of the label and the top edge of its box.
pub const LABEL_GAP: i32 = 6;

/// TrueType face used for box labels.
pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read label font '{}'", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid label font '{}': {}", path.display(), e))?;
        Ok(Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
        })
    }

    fn text_height(&self, text: &str) -> i32 {
        let (_, height) = text_size(self.scale, &self.font, text);
        height as i32
    }
}

/// A box as it was drawn: clamped corners plus label placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawnBox {
    pub bbox: PixelBox,
    pub label: String,
    /// Top-left corner of the label text.
    pub label_origin: (i32, i32),
}

/// An annotated frame ready to publish.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub image: ImageMessage,
    pub boxes: Vec<DrawnBox>,
}

/// Clamp each corner coordinate independently into the frame.
///
/// Ordering is not restored: a box lying entirely outside the frame can come
/// back degenerate or with `x1 > x2` / `y1 > y2`.
pub fn clamp_box(bbox: PixelBox, width: u32, height: u32) -> PixelBox {
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let clamp = |v: i32, max: i64| (v as i64).min(max).max(0) as i32;
    PixelBox {
        x1: clamp(bbox.x1, max_x),
        y1: clamp(bbox.y1, max_y),
        x2: clamp(bbox.x2, max_x),
        y2: clamp(bbox.y2, max_y),
    }
}

/// "person", with a " 2.50m" suffix when a finite depth is known.
pub fn label_text(detection: &Detection) -> String {
    match detection.depth_m {
        Some(depth) if depth.is_finite() => format!("{} {:.2}m", detection.label, depth),
        _ => detection.label.clone(),
    }
}

pub struct FrameAnnotator {
    font: Option<LabelFont>,
}

impl FrameAnnotator {
    pub fn new(font: Option<LabelFont>) -> Self {
        Self { font }
    }

    /// Annotator with the font at `path`, or box-only rendering when the font
    /// cannot be loaded.
    ///
    /// There is no built-in fallback face: without a font every overlay goes
    /// out with boxes but no label text. Only this one warning is logged.
    pub fn with_font_path(path: Option<&Path>) -> Self {
        let font = match path {
            Some(path) => match LabelFont::load(path) {
                Ok(font) => Some(font),
                Err(e) => {
                    log::warn!("{:#}; labels will not be rendered", e);
                    None
                }
            },
            None => {
                log::warn!("no label font configured; labels will not be rendered");
                None
            }
        };
        Self::new(font)
    }

    /// Annotator for the configured label font.
    ///
    /// A font the operator named explicitly must load; the built-in default
    /// path may be missing and degrades to box-only rendering.
    pub fn from_settings(path: Option<&Path>, required: bool) -> Result<Self> {
        match path {
            Some(path) if required => Ok(Self::new(Some(LabelFont::load(path)?))),
            _ => Ok(Self::with_font_path(path)),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `batch` onto `frame`.
    ///
    /// Returns `None` when there is nothing to draw, and when the frame cannot
    /// be decoded or the result cannot be encoded. The output carries the
    /// input header unchanged.
    pub fn render(&self, frame: &ImageMessage, batch: &DetectionBatch) -> Option<Overlay> {
        if batch.is_empty() {
            return None;
        }

        let mut canvas = match decode_bgr8(frame) {
            Ok(canvas) => canvas,
            Err(e) => {
                log::warn!("image decode failed: {:#}", e);
                return None;
            }
        };

        let (width, height) = canvas.dimensions();
        let boxes = batch
            .iter()
            .map(|detection| self.draw_detection(&mut canvas, detection, width, height))
            .collect();

        match encode_bgr8(&canvas, &frame.header) {
            Ok(image) => Some(Overlay { image, boxes }),
            Err(e) => {
                log::warn!("image encode failed: {:#}", e);
                None
            }
        }
    }

    fn draw_detection(
        &self,
        canvas: &mut BgrImage,
        detection: &Detection,
        width: u32,
        height: u32,
    ) -> DrawnBox {
        let bbox = clamp_box(detection.bbox, width, height);
        draw_outline(canvas, bbox);

        let label = label_text(detection);
        let text_height = self
            .font
            .as_ref()
            .map(|font| font.text_height(&label))
            .unwrap_or(LABEL_SCALE as i32);
        let label_origin = (bbox.x1, (bbox.y1 - LABEL_GAP - text_height).max(0));

        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                Rgb(BOX_COLOR),
                label_origin.0,
                label_origin.1,
                font.scale,
                &font.font,
                &label,
            );
        }

        DrawnBox {
            bbox,
            label,
            label_origin,
        }
    }
}

/// Outline the rectangle spanned by the corners, `STROKE_WIDTH` rings thick,
/// centred on the corner lines. Inverted corners span the same rectangle.
fn draw_outline(canvas: &mut BgrImage, bbox: PixelBox) {
    let left = bbox.x1.min(bbox.x2);
    let right = bbox.x1.max(bbox.x2);
    let top = bbox.y1.min(bbox.y2);
    let bottom = bbox.y1.max(bbox.y2);

    let first = -(STROKE_WIDTH / 2);
    for offset in first..first + STROKE_WIDTH {
        let (l, r) = (left + offset, right - offset);
        let (t, b) = (top + offset, bottom - offset);
        if r < l || b < t {
            continue;
        }
        let rect = Rect::at(l, t).of_size((r - l + 1) as u32, (b - t + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, Rgb(BOX_COLOR));
    }
}
