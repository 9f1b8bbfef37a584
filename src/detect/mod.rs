mod adapter;
mod filter;
mod result;
pub mod schema;

pub use adapter::{
    DetectionSchemaAdapter, PlanarAdapter, SchemaAdapter, SchemaVariant, SpatialAdapter,
};
pub use filter::{is_target_class, ClassId, TARGET_CLASS_ID, TARGET_CLASS_NAME};
pub use result::{bbox_from_center_size, Detection, DetectionBatch, PixelBox};
