//! Wire model of the two upstream detection schemas.
//!
//! Both follow the ROS message layouts, JSON encoded:
//! - `SpatialDetectionArray` (depthai_ros_msgs): hypotheses, a center/size box
//!   and a 3D position whose `z` is the depth in meters.
//! - `Detection2DArray` (vision_msgs): hypotheses and a center/size box only.
//!
//! Every field the detector may leave out is an `Option`. Entries with missing
//! pieces are dropped by the adapters, never rejected at parse time.

use serde::Deserialize;

use super::filter::ClassId;
use crate::frame::Header;

/// depthai_ros_msgs/SpatialDetectionArray
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpatialDetectionArray {
    #[serde(default)]
    pub header: Option<Header>,
    #[serde(default)]
    pub detections: Vec<SpatialDetection>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpatialDetection {
    #[serde(default)]
    pub results: Option<Vec<Hypothesis>>,
    #[serde(default)]
    pub bbox: Option<BoundingBox2D>,
    /// Position in the camera frame, meters.
    #[serde(default)]
    pub position: Option<Point3>,
}

/// vision_msgs/Detection2DArray
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Detection2DArray {
    #[serde(default)]
    pub header: Option<Header>,
    #[serde(default)]
    pub detections: Vec<Detection2D>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Detection2D {
    #[serde(default)]
    pub results: Option<Vec<Hypothesis>>,
    #[serde(default, alias = "bounding_box")]
    pub bbox: Option<BoundingBox2D>,
}

/// ObjectHypothesisWithPose, in either the flat (`{id, score}`) or the nested
/// (`{hypothesis: {class_id, score}}`) layout.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Hypothesis {
    Nested { hypothesis: ObjectHypothesis },
    Flat(ObjectHypothesis),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObjectHypothesis {
    #[serde(default, alias = "class_id")]
    pub id: Option<ClassId>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl Hypothesis {
    fn inner(&self) -> &ObjectHypothesis {
        match self {
            Self::Nested { hypothesis } => hypothesis,
            Self::Flat(hypothesis) => hypothesis,
        }
    }

    pub fn id(&self) -> Option<&ClassId> {
        self.inner().id.as_ref()
    }

    pub fn score(&self) -> Option<f64> {
        self.inner().score
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BoundingBox2D {
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub size: Option<Size2D>,
}

impl BoundingBox2D {
    /// `(cx, cy, w, h)` when both center and size are present.
    pub fn center_size(&self) -> Option<(f64, f64, f64, f64)> {
        let (cx, cy) = self.center.as_ref()?.xy();
        let size = self.size.as_ref()?;
        Some((cx, cy, size.x, size.y))
    }
}

/// Box center: a bare point, or a Pose2D (`{position: {x, y}, theta}`).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Center {
    Pose {
        position: Point2,
        #[serde(default)]
        theta: f64,
    },
    Point(Point2),
}

impl Center {
    pub fn xy(&self) -> (f64, f64) {
        match self {
            Self::Pose { position, .. } => (position.x, position.y),
            Self::Point(point) => (point.x, point.y),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Point2 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Size2D {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Point3 {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_nested_hypotheses_expose_the_same_fields() {
        let flat: Hypothesis = serde_json::from_str(r#"{"id": 15, "score": 0.8}"#).unwrap();
        let nested: Hypothesis =
            serde_json::from_str(r#"{"hypothesis": {"class_id": "15", "score": 0.8}}"#).unwrap();

        assert_eq!(flat.id(), Some(&ClassId::Integer(15)));
        assert_eq!(nested.id(), Some(&ClassId::Text("15".to_string())));
        assert_eq!(flat.score(), Some(0.8));
        assert_eq!(nested.score(), Some(0.8));
    }

    #[test]
    fn hypothesis_without_id_parses() {
        let hyp: Hypothesis = serde_json::from_str(r#"{"score": 0.4}"#).unwrap();
        assert!(hyp.id().is_none());
        let hyp: Hypothesis = serde_json::from_str(r#"{"id": null}"#).unwrap();
        assert!(hyp.id().is_none());
    }

    #[test]
    fn center_accepts_point_and_pose_layouts() {
        let point: Center = serde_json::from_str(r#"{"x": 1.0, "y": 2.0}"#).unwrap();
        let pose: Center =
            serde_json::from_str(r#"{"position": {"x": 3.0, "y": 4.0}, "theta": 0.0}"#).unwrap();
        assert_eq!(point.xy(), (1.0, 2.0));
        assert_eq!(pose.xy(), (3.0, 4.0));
    }

    #[test]
    fn bbox_requires_center_and_size() {
        let full: BoundingBox2D =
            serde_json::from_str(r#"{"center": {"x": 10, "y": 20}, "size": {"x": 4, "y": 6}}"#)
                .unwrap();
        assert_eq!(full.center_size(), Some((10.0, 20.0, 4.0, 6.0)));

        let no_size: BoundingBox2D =
            serde_json::from_str(r#"{"center": {"x": 10, "y": 20}}"#).unwrap();
        assert!(no_size.center_size().is_none());
    }

    #[test]
    fn planar_bbox_alias() {
        let det: Detection2D = serde_json::from_str(
            r#"{"results": [], "bounding_box": {"center": {"x": 1, "y": 1}, "size": {"x": 2, "y": 2}}}"#,
        )
        .unwrap();
        assert!(det.bbox.is_some());
    }
}
