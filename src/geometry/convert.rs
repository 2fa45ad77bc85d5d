// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Raw patch to mesh conversion

use super::{Mesh, Triangle, Vertex};
use crate::capture::RawSurfacePatch;
use crate::error::{PipelineError, Result};

/// Convert one raw surface patch into its canonical renderable form.
///
/// A pure 1:1 transform: vertices and normals map straight across, indices
/// are grouped into triangles. Rejects the patch with `InvalidGeometry` when
/// the index count is not a multiple of 3, an index exceeds the vertex
/// bound, or the normal count disagrees with the vertex count. The caller
/// discards the offending patch; nothing here ends the session.
pub fn convert(patch: &RawSurfacePatch) -> Result<Mesh> {
    if patch.normals.len() != patch.positions.len() {
        return Err(PipelineError::invalid_geometry(format!(
            "normal count {} does not match vertex count {}",
            patch.normals.len(),
            patch.positions.len()
        )));
    }

    if patch.indices.len() % 3 != 0 {
        return Err(PipelineError::invalid_geometry(format!(
            "index count {} is not a multiple of 3",
            patch.indices.len()
        )));
    }

    let bound = patch.positions.len() as u32;
    if let Some(&bad) = patch.indices.iter().find(|&&index| index >= bound) {
        return Err(PipelineError::invalid_geometry(format!(
            "index {bad} exceeds vertex count {bound}"
        )));
    }

    let mut mesh = Mesh::with_capacity(patch.positions.len(), patch.indices.len() / 3);
    for (position, normal) in patch.positions.iter().zip(&patch.normals) {
        mesh.add_vertex(Vertex::new(*position, *normal));
    }
    for triangle in patch.indices.chunks_exact(3) {
        mesh.add_triangle(Triangle::new([triangle[0], triangle[1], triangle[2]]));
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn quad_patch() -> RawSurfacePatch {
        RawSurfacePatch::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Vector3::new(0.0, 0.0, 1.0); 4],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_convert_preserves_vertices_and_groups_triangles() {
        let patch = quad_patch();
        let mesh = convert(&patch).unwrap();

        assert_eq!(mesh.vertex_count(), patch.vertex_count());
        assert_eq!(mesh.triangle_count(), patch.index_count() / 3);
        assert_eq!(mesh.triangles[1].indices, [0, 2, 3]);
        assert_eq!(mesh.vertices[2].position, Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_convert_rejects_ragged_index_list() {
        let mut patch = quad_patch();
        patch.indices.pop();

        let err = convert(&patch).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry { .. }));
        assert!(err.to_string().contains("multiple of 3"));
    }

    #[test]
    fn test_convert_rejects_out_of_bounds_index() {
        let mut patch = quad_patch();
        patch.indices[4] = 9;

        let err = convert(&patch).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry { .. }));
        assert!(err.to_string().contains("index 9"));
    }

    #[test]
    fn test_convert_rejects_mismatched_normals() {
        let mut patch = quad_patch();
        patch.normals.pop();

        let err = convert(&patch).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_convert_accepts_empty_patch() {
        let patch = RawSurfacePatch::new(Vec::new(), Vec::new(), Vec::new());
        let mesh = convert(&patch).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }
}
