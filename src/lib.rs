// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyscan reconstruction pipeline
//!
//! Incrementally merges depth-capture surface patches into a textured
//! triangle-mesh scene and exports it as a deterministic, self-contained
//! GLB container.

pub mod capture;
pub mod error;
pub mod geometry;
pub mod io;
pub mod scene;
pub mod session;

pub use capture::{AnchorId, AnchorMeshBuffer, CaptureEvent, ColorFrame, FrameSource, RawSurfacePatch};
pub use error::{PipelineError, Result};
pub use geometry::{convert, BoundingBox, Mesh, Triangle, Vertex};
pub use io::{export_glb, ExportStaging, ExportedFile};
pub use scene::{assemble, generate_texture, merge_snapshot, Material, MeshNode, SceneGraph, TextureResource};
pub use session::{ScanSession, SessionDelegate, SessionState};

use std::sync::Arc;

/// Build an export-ready scene from a frozen buffer snapshot and one
/// captured color frame.
///
/// Convenience for callers driving the pipeline stages directly; the
/// session does the same work with per-patch failure reporting.
pub fn reconstruct(
    snapshot: &[(AnchorId, Arc<RawSurfacePatch>)],
    frame: &ColorFrame,
) -> Result<SceneGraph> {
    let forest = merge_snapshot(snapshot).forest;
    let texture = generate_texture(frame)?;
    Ok(assemble(forest, Material::textured(texture).shared()))
}
