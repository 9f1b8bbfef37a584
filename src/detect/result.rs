use super::filter::TARGET_CLASS_NAME;

/// Box corners in integer pixel coordinates.
///
/// Produced unclamped by the schema adapters; the annotator clamps against the
/// frame it draws on, which may not share the detector's resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Converts a center/size box to corners.
///
/// Each corner is rounded half away from zero and then truncated to an
/// integer. No clamping happens here.
pub fn bbox_from_center_size(cx: f64, cy: f64, w: f64, h: f64) -> PixelBox {
    let half_w = w / 2.0;
    let half_h = h / 2.0;
    PixelBox {
        x1: (cx - half_w).round() as i32,
        y1: (cy - half_h).round() as i32,
        x2: (cx + half_w).round() as i32,
        y2: (cy + half_h).round() as i32,
    }
}

/// One accepted detection of the target class.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: PixelBox,
    /// Always "person" for accepted detections.
    pub label: String,
    /// Distance along the camera axis, meters. Spatial schema only.
    pub depth_m: Option<f64>,
    /// Score of the evaluated hypothesis. Reported, never used for filtering.
    pub score: Option<f64>,
}

impl Detection {
    pub fn person(bbox: PixelBox, depth_m: Option<f64>, score: Option<f64>) -> Self {
        Self {
            bbox,
            label: TARGET_CLASS_NAME.to_string(),
            depth_m,
            score,
        }
    }
}

/// Detections derived from a single detection message, in message order.
///
/// There are no mutable accessors: a batch is replaced, never edited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionBatch {
    detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }
}

impl FromIterator<Detection> for DetectionBatch {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_size_to_corners() {
        assert_eq!(
            bbox_from_center_size(100.0, 50.0, 40.0, 20.0),
            PixelBox::new(80, 40, 120, 60)
        );
    }

    #[test]
    fn halves_round_away_from_zero() {
        // 10 - 2.5 = 7.5 -> 8, 10 + 2.5 = 12.5 -> 13
        assert_eq!(
            bbox_from_center_size(10.0, 10.0, 5.0, 5.0),
            PixelBox::new(8, 8, 13, 13)
        );
        // -0.5 - 2 = -2.5 -> -3
        assert_eq!(
            bbox_from_center_size(-0.5, -0.5, 4.0, 4.0),
            PixelBox::new(-3, -3, 2, 2)
        );
    }

    #[test]
    fn corners_are_not_clamped() {
        let bbox = bbox_from_center_size(0.0, 0.0, 100.0, 100.0);
        assert_eq!(bbox, PixelBox::new(-50, -50, 50, 50));
    }

    #[test]
    fn person_detection_carries_fixed_label() {
        let det = Detection::person(PixelBox::new(1, 2, 3, 4), Some(1.5), None);
        assert_eq!(det.label, "person");
        assert_eq!(det.depth_m, Some(1.5));
    }

    #[test]
    fn batch_preserves_order() {
        let batch: DetectionBatch = (0..3)
            .map(|i| Detection::person(PixelBox::new(i, i, i + 1, i + 1), None, None))
            .collect();
        let xs: Vec<i32> = batch.iter().map(|d| d.bbox.x1).collect();
        assert_eq!(xs, vec![0, 1, 2]);
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert!(DetectionBatch::empty().is_empty());
    }
}
