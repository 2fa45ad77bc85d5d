// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene graph assembly from merged surface forests

use super::Material;
use crate::capture::{AnchorId, RawSurfacePatch};
use crate::error::PipelineError;
use crate::geometry::{convert, Mesh};
use nalgebra::Point3;
use rayon::prelude::*;
use std::sync::Arc;

/// One anchor's entity in the scene: provenance, mesh, optional material.
///
/// Created on first update for an anchor and mutated in place on later
/// updates so callers holding the graph can keep targeting the same node.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub anchor: AnchorId,
    pub mesh: Mesh,
    pub material: Option<Arc<Material>>,
}

impl MeshNode {
    pub fn new(anchor: AnchorId, mesh: Mesh) -> Self {
        Self {
            anchor,
            mesh,
            material: None,
        }
    }

    /// Replace this node's geometry, keeping identity and material
    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = mesh;
    }
}

/// Exportable scene: a root anchored at world origin with one child node
/// per surviving anchor, in snapshot order
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub origin: Point3<f32>,
    pub nodes: Vec<MeshNode>,
}

impl SceneGraph {
    pub fn node(&self, anchor: &AnchorId) -> Option<&MeshNode> {
        self.nodes.iter().find(|node| &node.anchor == anchor)
    }

    pub fn node_mut(&mut self, anchor: &AnchorId) -> Option<&mut MeshNode> {
        self.nodes.iter_mut().find(|node| &node.anchor == anchor)
    }

    /// The shared material, if one has been attached
    pub fn material(&self) -> Option<&Arc<Material>> {
        self.nodes.first().and_then(|node| node.material.as_ref())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Result of merging a frozen snapshot: the surviving forest plus the
/// patches that were discarded as malformed
#[derive(Debug)]
pub struct MergeOutcome {
    pub forest: Vec<MeshNode>,
    pub discarded: Vec<(AnchorId, PipelineError)>,
}

/// Convert a frozen buffer snapshot into a forest of mesh nodes.
///
/// Anchors are independent: each patch converts on its own (in parallel,
/// order preserved) and keeps its provenance, with no cross-anchor
/// deduplication or vertex welding. Malformed patches are logged and
/// collected in `discarded`; the merge itself never fails.
pub fn merge_snapshot(snapshot: &[(AnchorId, Arc<RawSurfacePatch>)]) -> MergeOutcome {
    let converted: Vec<_> = snapshot
        .par_iter()
        .map(|(anchor, patch)| (anchor.clone(), convert(patch)))
        .collect();

    let mut forest = Vec::with_capacity(converted.len());
    let mut discarded = Vec::new();
    for (anchor, result) in converted {
        match result {
            Ok(mesh) => forest.push(MeshNode::new(anchor, mesh)),
            Err(err) => {
                log::warn!("discarding malformed patch for anchor {anchor}: {err}");
                discarded.push((anchor, err));
            }
        }
    }

    MergeOutcome { forest, discarded }
}

/// Attach one shared material to every node and root the forest at world
/// origin (not the physical scan origin, for viewer portability).
///
/// Idempotent: identical inputs yield structurally equal graphs.
pub fn assemble(mut forest: Vec<MeshNode>, material: Arc<Material>) -> SceneGraph {
    for node in &mut forest {
        node.material = Some(Arc::clone(&material));
    }

    SceneGraph {
        origin: Point3::origin(),
        nodes: forest,
    }
}
