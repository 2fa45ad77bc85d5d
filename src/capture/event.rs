// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Capture-subsystem event and frame types

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier the capture subsystem assigns to a tracked
/// surface patch. Unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorId(String);

impl AnchorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AnchorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Raw per-anchor geometry as delivered by the capture subsystem at one
/// point in time: positions, per-vertex normals, and a triangle index list.
///
/// Structural invariants (every index below the vertex bound, index count a
/// multiple of 3, one normal per vertex) are checked at conversion time, not
/// on receipt; a capture feed is free to hand over garbage and the pipeline
/// discards it there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSurfacePatch {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub indices: Vec<u32>,
}

impl RawSurfacePatch {
    pub fn new(positions: Vec<Point3<f32>>, normals: Vec<Vector3<f32>>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Anchor lifecycle events emitted by the capture subsystem.
///
/// A sealed tagged-variant type: the pipeline dispatches on the variant and
/// never inspects payload types at runtime. Added and updated surfaces carry
/// the full replacement patch; the latest one wins.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    SurfaceAdded {
        anchor: AnchorId,
        patch: RawSurfacePatch,
    },
    SurfaceUpdated {
        anchor: AnchorId,
        patch: RawSurfacePatch,
    },
    SurfaceRemoved {
        anchor: AnchorId,
    },
}

impl CaptureEvent {
    pub fn anchor(&self) -> &AnchorId {
        match self {
            Self::SurfaceAdded { anchor, .. }
            | Self::SurfaceUpdated { anchor, .. }
            | Self::SurfaceRemoved { anchor } => anchor,
        }
    }
}

/// One captured color image in fixed RGBA8 layout, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ColorFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Byte length a well-formed buffer must have for these dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Live camera feed seam. Implemented by the capture subsystem; the session
/// samples it exactly once per finalize.
pub trait FrameSource: Send + Sync {
    fn current_color_frame(&self) -> Option<ColorFrame>;
}
