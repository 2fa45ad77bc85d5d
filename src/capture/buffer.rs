// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Latest-patch store keyed by anchor identity

use super::{AnchorId, RawSurfacePatch};
use ahash::AHashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct BufferInner {
    patches: AHashMap<AnchorId, Arc<RawSurfacePatch>>,
    order: Vec<AnchorId>,
}

/// Stores the latest raw patch per anchor while a scan is live.
///
/// Writers (the capture feed) and the snapshot reader go through a single
/// `RwLock`, so a snapshot is one consistent cut across all entries: no
/// torn or half-replaced patch is ever observable. Patches sit behind `Arc`,
/// which keeps replacement and snapshotting cheap regardless of patch size.
///
/// Snapshot order is first-seen insertion order, which downstream stages
/// rely on for deterministic export. No size bound; the buffer lives for one
/// session.
pub struct AnchorMeshBuffer {
    inner: RwLock<BufferInner>,
}

impl AnchorMeshBuffer {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BufferInner::default()),
        }
    }

    /// Store or overwrite the latest patch for an anchor
    pub fn accept(&self, anchor: AnchorId, patch: RawSurfacePatch) {
        let mut inner = self.inner.write().unwrap();
        if !inner.patches.contains_key(&anchor) {
            inner.order.push(anchor.clone());
        }
        inner.patches.insert(anchor, Arc::new(patch));
    }

    /// Drop an anchor and its patch; unknown anchors are a no-op
    pub fn remove(&self, anchor: &AnchorId) {
        let mut inner = self.inner.write().unwrap();
        if inner.patches.remove(anchor).is_some() {
            inner.order.retain(|id| id != anchor);
        }
    }

    /// One consistent cut of the buffer, in first-seen insertion order
    pub fn snapshot(&self) -> Vec<(AnchorId, Arc<RawSurfacePatch>)> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .patches
                    .get(id)
                    .map(|patch| (id.clone(), Arc::clone(patch)))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset for a fresh session
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.patches.clear();
        inner.order.clear();
    }
}

impl Default for AnchorMeshBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use std::thread;

    fn patch(vertex_count: usize) -> RawSurfacePatch {
        let positions = (0..vertex_count)
            .map(|i| Point3::new(i as f32, 0.0, 0.0))
            .collect();
        let normals = vec![Vector3::new(0.0, 1.0, 0.0); vertex_count];
        let indices = (0..vertex_count as u32).collect();
        RawSurfacePatch::new(positions, normals, indices)
    }

    #[test]
    fn test_accept_overwrites_latest() {
        let buffer = AnchorMeshBuffer::new();
        buffer.accept("a1".into(), patch(3));
        buffer.accept("a1".into(), patch(6));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1.vertex_count(), 6);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let buffer = AnchorMeshBuffer::new();
        buffer.accept("b".into(), patch(3));
        buffer.accept("a".into(), patch(3));
        buffer.accept("c".into(), patch(3));
        // updating an existing anchor must not move it
        buffer.accept("b".into(), patch(6));

        let order: Vec<_> = buffer
            .snapshot()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn test_remove_drops_anchor() {
        let buffer = AnchorMeshBuffer::new();
        buffer.accept("a1".into(), patch(3));
        buffer.accept("a2".into(), patch(3));
        buffer.remove(&"a1".into());

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0.as_str(), "a2");

        // removing again is a no-op
        buffer.remove(&"a1".into());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_clear_resets_buffer() {
        let buffer = AnchorMeshBuffer::new();
        buffer.accept("a1".into(), patch(3));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_never_observes_torn_patch() {
        let buffer = Arc::new(AnchorMeshBuffer::new());
        let writer = Arc::clone(&buffer);

        // Writer keeps replacing the same anchors with patches of alternating
        // size; every patch it writes is internally consistent.
        let handle = thread::spawn(move || {
            for round in 0..500 {
                let size = if round % 2 == 0 { 3 } else { 12 };
                writer.accept("a1".into(), patch(size));
                writer.accept("a2".into(), patch(size * 2));
                if round % 7 == 0 {
                    writer.remove(&"a2".into());
                }
            }
        });

        for _ in 0..500 {
            for (_, patch) in buffer.snapshot() {
                assert_eq!(patch.normals.len(), patch.positions.len());
                assert_eq!(patch.index_count() % 3, 0);
                let bound = patch.vertex_count() as u32;
                assert!(patch.indices.iter().all(|&i| i < bound));
            }
        }

        handle.join().unwrap();
    }
}
