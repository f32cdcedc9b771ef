//! Objects and the dataset arena that owns them

use std::collections::HashSet;
use std::ops::Index as IndexOp;

use crate::error::{Result, SearchError};

/// Identifier of an object, assigned by the caller or the dataset loader.
pub type ObjectId = usize;

/// An immutable data item: an identifier plus a fixed-length number buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    id: ObjectId,
    data: Box<[f32]>,
}

impl Object {
    /// Create a new object from its id and payload.
    pub fn new(id: ObjectId, data: Vec<f32>) -> Self {
        Self {
            id,
            data: data.into_boxed_slice(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The payload as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of elements in the payload.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Payload length in bytes.
    pub fn data_length(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// An arena holding every object of a dataset.
///
/// Indexes refer to objects by their position in the arena. A dataset is
/// shared with indexes through an `Arc`, so it cannot be dropped or mutated
/// while an index built from it is alive.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    objects: Vec<Object>,
}

impl Dataset {
    /// Build a dataset, rejecting duplicate object ids.
    pub fn new(objects: Vec<Object>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(objects.len());
        for obj in &objects {
            if !seen.insert(obj.id()) {
                return Err(SearchError::InvalidDataset {
                    reason: format!("duplicate object id {}", obj.id()),
                });
            }
        }
        Ok(Self { objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get the object stored at `pos`.
    pub fn get(&self, pos: usize) -> Option<&Object> {
        self.objects.get(pos)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.objects.iter()
    }

    pub fn as_slice(&self) -> &[Object] {
        &self.objects
    }

    /// Give the objects back to the caller.
    pub fn into_objects(self) -> Vec<Object> {
        self.objects
    }
}

impl IndexOp<usize> for Dataset {
    type Output = Object;

    fn index(&self, pos: usize) -> &Object {
        &self.objects[pos]
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_creation() {
        let obj = Object::new(7, vec![1.0, 2.0, 3.0]);
        assert_eq!(obj.id(), 7);
        assert_eq!(obj.dimension(), 3);
        assert_eq!(obj.data_length(), 12);
        assert_eq!(obj.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_dataset_rejects_duplicate_ids() {
        let objs = vec![Object::new(1, vec![0.0]), Object::new(1, vec![1.0])];
        assert!(matches!(
            Dataset::new(objs),
            Err(SearchError::InvalidDataset { .. })
        ));
    }

    #[test]
    fn test_dataset_positions() {
        let ds = Dataset::new(vec![Object::new(10, vec![0.0]), Object::new(20, vec![1.0])]).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[1].id(), 20);
        assert!(ds.get(2).is_none());
        let ids: Vec<_> = ds.iter().map(Object::id).collect();
        assert_eq!(ids, vec![10, 20]);
    }
}
