//! Person detection node: ties the adapter, cache and annotator together.
//!
//! The transport calls `on_detections` and `on_image` from a single dispatch
//! thread, one message at a time. That ordering is the only synchronization
//! between the two streams: whatever batch is cached when an image arrives is
//! drawn on it, regardless of how old the batch is.

use anyhow::Result;

use crate::annotate::{FrameAnnotator, Overlay};
use crate::cache::DetectionCache;
use crate::config::TopicSettings;
use crate::detect::{DetectionBatch, SchemaAdapter, SchemaVariant, TARGET_CLASS_ID};
use crate::frame::ImageMessage;

pub struct PersonDetectionNode {
    adapter: SchemaAdapter,
    cache: DetectionCache,
    annotator: FrameAnnotator,
}

impl PersonDetectionNode {
    pub fn new(schema: SchemaVariant, annotator: FrameAnnotator) -> Self {
        let adapter = SchemaAdapter::for_variant(schema);
        log::info!("Using {}.", adapter.describe());
        Self {
            adapter,
            cache: DetectionCache::new(),
            annotator,
        }
    }

    pub fn schema(&self) -> SchemaVariant {
        self.adapter.variant()
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    /// Handle one detection message. Returns the number of people cached.
    ///
    /// A payload that does not decode is an error and leaves the cache as it
    /// was. A decoded message always replaces the cache, even when it holds no
    /// people.
    pub fn on_detections(&mut self, payload: &[u8]) -> Result<usize> {
        let batch = self.adapter.adapt_payload(payload)?;
        report(&batch);
        let count = batch.len();
        self.cache.set(batch);
        Ok(count)
    }

    /// Handle one image message. Returns the overlay to publish, if any.
    pub fn on_image(&self, payload: &[u8]) -> Result<Option<Overlay>> {
        let frame = ImageMessage::from_json(payload)?;
        Ok(self.render(&frame))
    }

    /// Route one incoming message by topic.
    ///
    /// Detection messages update the cache and never produce output. Image
    /// messages produce the overlay to publish, if any. Other topics are
    /// ignored.
    pub fn on_message(
        &mut self,
        topics: &TopicSettings,
        topic: &str,
        payload: &[u8],
    ) -> Result<Option<Overlay>> {
        if topic == topics.detections {
            self.on_detections(payload)?;
            Ok(None)
        } else if topic == topics.image {
            self.on_image(payload)
        } else {
            log::debug!("Ignoring message on {}", topic);
            Ok(None)
        }
    }

    /// Draw the cached batch on `frame`.
    pub fn render(&self, frame: &ImageMessage) -> Option<Overlay> {
        self.annotator.render(frame, self.cache.get())
    }
}

fn report(batch: &DetectionBatch) {
    if batch.is_empty() {
        log::debug!("no people in detection message");
        return;
    }
    log::info!("People (class {}) detected:", TARGET_CLASS_ID);
    for detection in batch {
        let bbox = detection.bbox;
        let mut line = format!("  bbox=({},{})-({},{})", bbox.x1, bbox.y1, bbox.x2, bbox.y2);
        if let Some(score) = detection.score {
            line.push_str(&format!("  score={:.2}", score));
        }
        if let Some(depth) = detection.depth_m {
            line.push_str(&format!("  Z={:.2}m", depth));
        }
        log::info!("{}", line);
    }
}
