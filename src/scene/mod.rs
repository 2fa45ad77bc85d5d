// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene module - materials, texture sampling, and graph assembly

mod graph;
mod material;
mod texture;

pub use graph::{assemble, merge_snapshot, MergeOutcome, MeshNode, SceneGraph};
pub use material::{Material, TextureResource};
pub use texture::generate as generate_texture;
