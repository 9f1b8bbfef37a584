use crate::detect::DetectionBatch;

/// Most recent detection batch, last write wins.
///
/// Written by the detection callback and read by the image callback. Both run
/// on the dispatch thread one at a time, so the cache is a plain owned value
/// with no locking. There is no expiry: a batch stays current until the next
/// detection message replaces it, however old it gets.
#[derive(Debug, Default)]
pub struct DetectionCache {
    batch: DetectionBatch,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored batch. An empty batch clears the cache.
    pub fn set(&mut self, batch: DetectionBatch) {
        self.batch = batch;
    }

    pub fn get(&self) -> &DetectionBatch {
        &self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, PixelBox};

    fn batch_of(xs: &[i32]) -> DetectionBatch {
        xs.iter()
            .map(|&x| Detection::person(PixelBox::new(x, 0, x + 1, 1), None, None))
            .collect()
    }

    #[test]
    fn starts_empty() {
        let cache = DetectionCache::new();
        assert!(cache.is_empty());
        assert!(cache.get().is_empty());
    }

    #[test]
    fn set_replaces_instead_of_merging() {
        let mut cache = DetectionCache::new();
        cache.set(batch_of(&[1, 2, 3]));
        cache.set(batch_of(&[9]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(), &batch_of(&[9]));
    }

    #[test]
    fn empty_batch_overwrites_full_batch() {
        let mut cache = DetectionCache::new();
        cache.set(batch_of(&[1, 2, 3]));
        cache.set(DetectionBatch::empty());
        assert!(cache.is_empty());
    }
}
