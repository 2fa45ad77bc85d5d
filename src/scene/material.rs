// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh materials

use std::sync::Arc;

/// GPU-consumable texture sampled once from the live camera feed
#[derive(Debug, Clone, PartialEq)]
pub struct TextureResource {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixel data, ready for embedding in the container
    pub png: Vec<u8>,
}

/// Material attached to scanned surfaces.
///
/// The two variants are mutually exclusive: a flat color drives the live
/// preview while scanning, a single captured texture drives export. One
/// shared instance (behind `Arc`) covers the whole merged forest.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    FlatColor { rgba: [f32; 4] },
    Textured { texture: TextureResource },
}

impl Material {
    /// Neutral gray used for surfaces while the scan is live
    pub fn preview() -> Self {
        Self::FlatColor {
            rgba: [0.72, 0.72, 0.75, 1.0],
        }
    }

    pub fn flat(rgba: [f32; 4]) -> Self {
        Self::FlatColor { rgba }
    }

    pub fn textured(texture: TextureResource) -> Self {
        Self::Textured { texture }
    }

    pub fn is_textured(&self) -> bool {
        matches!(self, Self::Textured { .. })
    }

    /// Shared handle for attaching one instance across many nodes
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
