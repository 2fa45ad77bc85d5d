// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation and patch conversion

mod bbox;
mod convert;
mod mesh;

pub use bbox::BoundingBox;
pub use convert::convert;
pub use mesh::{Mesh, Triangle, Vertex};
