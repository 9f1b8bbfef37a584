use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use super::filter::is_target_class;
use super::result::{bbox_from_center_size, Detection, DetectionBatch, PixelBox};
use super::schema::{BoundingBox2D, Detection2DArray, Hypothesis, SpatialDetectionArray};

/// Which upstream schema this process consumes.
///
/// Selected once at startup. Messages are never re-interpreted under the
/// other schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaVariant {
    /// SpatialDetectionArray, with depth.
    #[default]
    Spatial,
    /// Detection2DArray, 2D only.
    Planar,
}

impl FromStr for SchemaVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "spatial" | "spatial_detection_array" | "depthai" => Ok(Self::Spatial),
            "planar" | "detection2d" | "detection2d_array" | "vision_msgs" => Ok(Self::Planar),
            other => Err(anyhow!(
                "unknown detection schema '{}': expected 'spatial' or 'planar'",
                other
            )),
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spatial => write!(f, "spatial"),
            Self::Planar => write!(f, "planar"),
        }
    }
}

/// Normalizes one upstream detection message into a `DetectionBatch`.
///
/// Implementations are pure: no logging, no state. Entries that are not the
/// target class or lack geometry are dropped without error.
pub trait DetectionSchemaAdapter {
    type Message: DeserializeOwned;

    fn variant(&self) -> SchemaVariant;

    fn adapt(&self, msg: &Self::Message) -> DetectionBatch;

    /// Decode a JSON payload and adapt it.
    fn adapt_json(&self, payload: &[u8]) -> Result<DetectionBatch> {
        let msg: Self::Message = serde_json::from_slice(payload)
            .with_context(|| format!("parse {} detection message", self.variant()))?;
        Ok(self.adapt(&msg))
    }
}

/// Adapter for `SpatialDetectionArray`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpatialAdapter;

/// Adapter for `Detection2DArray`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarAdapter;

impl DetectionSchemaAdapter for SpatialAdapter {
    type Message = SpatialDetectionArray;

    fn variant(&self) -> SchemaVariant {
        SchemaVariant::Spatial
    }

    fn adapt(&self, msg: &SpatialDetectionArray) -> DetectionBatch {
        msg.detections
            .iter()
            .filter_map(|det| {
                let (bbox, score) = accept_entry(det.results.as_deref(), det.bbox.as_ref())?;
                let depth_m = det
                    .position
                    .and_then(|position| position.z)
                    .filter(|z| z.is_finite());
                Some(Detection::person(bbox, depth_m, score))
            })
            .collect()
    }
}

impl DetectionSchemaAdapter for PlanarAdapter {
    type Message = Detection2DArray;

    fn variant(&self) -> SchemaVariant {
        SchemaVariant::Planar
    }

    fn adapt(&self, msg: &Detection2DArray) -> DetectionBatch {
        msg.detections
            .iter()
            .filter_map(|det| {
                let (bbox, score) = accept_entry(det.results.as_deref(), det.bbox.as_ref())?;
                Some(Detection::person(bbox, None, score))
            })
            .collect()
    }
}

/// Shared acceptance steps for one entry: first hypothesis, class check,
/// geometry. Returns the corners and the evaluated hypothesis score.
///
/// Only the first hypothesis is evaluated even when a later one scores higher.
fn accept_entry(
    results: Option<&[Hypothesis]>,
    bbox: Option<&BoundingBox2D>,
) -> Option<(PixelBox, Option<f64>)> {
    let first = results?.first()?;
    if !is_target_class(first.id()) {
        return None;
    }
    let (cx, cy, w, h) = bbox?.center_size()?;
    Some((bbox_from_center_size(cx, cy, w, h), first.score()))
}

/// The adapter chosen for this process.
#[derive(Clone, Copy, Debug)]
pub enum SchemaAdapter {
    Spatial(SpatialAdapter),
    Planar(PlanarAdapter),
}

impl SchemaAdapter {
    pub fn for_variant(variant: SchemaVariant) -> Self {
        match variant {
            SchemaVariant::Spatial => Self::Spatial(SpatialAdapter),
            SchemaVariant::Planar => Self::Planar(PlanarAdapter),
        }
    }

    pub fn variant(&self) -> SchemaVariant {
        match self {
            Self::Spatial(adapter) => adapter.variant(),
            Self::Planar(adapter) => adapter.variant(),
        }
    }

    /// Human readable description of the consumed message type.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Spatial(_) => "SpatialDetectionArray (with depth)",
            Self::Planar(_) => "Detection2DArray (2D only)",
        }
    }

    pub fn adapt_payload(&self, payload: &[u8]) -> Result<DetectionBatch> {
        match self {
            Self::Spatial(adapter) => adapter.adapt_json(payload),
            Self::Planar(adapter) => adapter.adapt_json(payload),
        }
    }
}
