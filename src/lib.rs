//! Person overlay
//!
//! Filters an upstream object detector's output down to people and draws the
//! most recent set of person boxes onto a camera image stream.
//!
//! # Architecture
//!
//! Two independent input streams share a single cache:
//!
//! 1. **Detections**: a `SchemaAdapter` normalizes either a
//!    `SpatialDetectionArray` (with depth) or a `Detection2DArray` (2D only)
//!    into a `DetectionBatch`, which replaces the contents of the
//!    `DetectionCache`.
//! 2. **Images**: the `FrameAnnotator` draws the cached batch onto each frame
//!    and emits an overlay with the input header. Frames arriving while the
//!    cache is empty produce no output.
//!
//! The schema variant is chosen once at startup. There is no timestamp
//! correlation between the streams.
//!
//! # Module Structure
//!
//! - `detect`: class filter, wire schemas, adapters, canonical detections
//! - `cache`: last-write-wins detection cache
//! - `frame`: image wire model and BGR codec bridge
//! - `annotate`: box and label rendering
//! - `node`: the orchestrator driven by the transport callbacks
//! - `config`: file and environment configuration
//! - `transport`: MQTT endpoint and TLS setup

pub mod annotate;
pub mod cache;
pub mod config;
pub mod detect;
pub mod frame;
pub mod node;
pub mod transport;

pub use annotate::{clamp_box, label_text, DrawnBox, FrameAnnotator, LabelFont, Overlay};
pub use cache::DetectionCache;
pub use config::{OverlayConfig, TopicSettings};
pub use detect::{
    bbox_from_center_size, is_target_class, ClassId, Detection, DetectionBatch,
    DetectionSchemaAdapter, PixelBox, PlanarAdapter, SchemaAdapter, SchemaVariant, SpatialAdapter,
    TARGET_CLASS_ID, TARGET_CLASS_NAME,
};
pub use frame::{decode_bgr8, encode_bgr8, BgrImage, Header, ImageMessage, PixelEncoding, Time};
pub use node::PersonDetectionNode;
