// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! GLB (binary glTF 2.0) exporter

use crate::error::{PipelineError, Result};
use crate::scene::{Material, SceneGraph};
use serde_json::{json, Value};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_F32: u32 = 5126;
const COMPONENT_U32: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;
const FILTER_LINEAR: u32 = 9729;
const WRAP_REPEAT: u32 = 10497;

/// Export a scene graph as a self-contained GLB container.
///
/// The container bundles geometry, the shared material, and the embedded
/// PNG texture in one file. Output is deterministic: a fixed generator
/// string, no timestamps, no random identifiers, and sorted JSON keys, so
/// repeated export of an unchanged graph is byte-identical.
pub fn export(graph: &SceneGraph) -> Result<Vec<u8>> {
    let (document, buffer_data) = build_document(graph)?;

    let json_string = serde_json::to_string(&document)
        .map_err(|e| PipelineError::export_failed(format!("failed to serialize scene document: {e}")))?;
    let mut json_chunk = json_string.into_bytes();
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }

    let mut bin_chunk = buffer_data;
    while bin_chunk.len() % 4 != 0 {
        bin_chunk.push(0);
    }

    let mut total_length = 12 + 8 + json_chunk.len();
    if !bin_chunk.is_empty() {
        total_length += 8 + bin_chunk.len();
    }

    let mut out = Vec::with_capacity(total_length);

    // GLB header
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_chunk);

    // BIN chunk, omitted when the scene carries no payload
    if !bin_chunk.is_empty() {
        out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin_chunk);
    }

    Ok(out)
}

fn build_document(graph: &SceneGraph) -> Result<(Value, Vec<u8>)> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut buffer_views: Vec<Value> = Vec::new();
    let mut accessors: Vec<Value> = Vec::new();
    let mut meshes: Vec<Value> = Vec::new();
    let mut nodes: Vec<Value> = Vec::new();

    // Node 0 is the root at world origin; children follow in snapshot order
    let mut root = serde_json::Map::new();
    root.insert("name".to_string(), json!("scene_root"));
    if !graph.nodes.is_empty() {
        let children: Vec<usize> = (1..=graph.nodes.len()).collect();
        root.insert("children".to_string(), json!(children));
    }
    nodes.push(Value::Object(root));

    for node in &graph.nodes {
        // An anchor whose latest patch had no geometry still keeps its node
        if node.mesh.is_empty() {
            nodes.push(json!({ "name": node.anchor.as_str() }));
            continue;
        }

        let mesh = &node.mesh;

        // Write positions
        let mut positions = Vec::with_capacity(mesh.vertex_count() * 12);
        for vertex in &mesh.vertices {
            positions.extend_from_slice(&vertex.position.x.to_le_bytes());
            positions.extend_from_slice(&vertex.position.y.to_le_bytes());
            positions.extend_from_slice(&vertex.position.z.to_le_bytes());
        }
        let position_view = push_view(
            &mut buffer,
            &mut buffer_views,
            &positions,
            Some(TARGET_ARRAY_BUFFER),
        );

        // Write normals
        let mut normals = Vec::with_capacity(mesh.vertex_count() * 12);
        for vertex in &mesh.vertices {
            normals.extend_from_slice(&vertex.normal.x.to_le_bytes());
            normals.extend_from_slice(&vertex.normal.y.to_le_bytes());
            normals.extend_from_slice(&vertex.normal.z.to_le_bytes());
        }
        let normal_view = push_view(
            &mut buffer,
            &mut buffer_views,
            &normals,
            Some(TARGET_ARRAY_BUFFER),
        );

        // Write texture coordinates: a constant center sample per vertex.
        // The capture texture is a flat attachment, not a UV projection.
        let mut texcoords = Vec::with_capacity(mesh.vertex_count() * 8);
        for _ in &mesh.vertices {
            texcoords.extend_from_slice(&0.5f32.to_le_bytes());
            texcoords.extend_from_slice(&0.5f32.to_le_bytes());
        }
        let texcoord_view = push_view(
            &mut buffer,
            &mut buffer_views,
            &texcoords,
            Some(TARGET_ARRAY_BUFFER),
        );

        // Write indices
        let mut indices = Vec::with_capacity(mesh.triangle_count() * 12);
        for triangle in &mesh.triangles {
            indices.extend_from_slice(&triangle.indices[0].to_le_bytes());
            indices.extend_from_slice(&triangle.indices[1].to_le_bytes());
            indices.extend_from_slice(&triangle.indices[2].to_le_bytes());
        }
        let index_view = push_view(
            &mut buffer,
            &mut buffer_views,
            &indices,
            Some(TARGET_ELEMENT_ARRAY_BUFFER),
        );

        let bbox = mesh.bounding_box();
        let position_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": position_view,
            "byteOffset": 0,
            "componentType": COMPONENT_F32,
            "count": mesh.vertex_count(),
            "type": "VEC3",
            "min": [bbox.min.x, bbox.min.y, bbox.min.z],
            "max": [bbox.max.x, bbox.max.y, bbox.max.z]
        }));
        let normal_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": normal_view,
            "byteOffset": 0,
            "componentType": COMPONENT_F32,
            "count": mesh.vertex_count(),
            "type": "VEC3"
        }));
        let texcoord_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": texcoord_view,
            "byteOffset": 0,
            "componentType": COMPONENT_F32,
            "count": mesh.vertex_count(),
            "type": "VEC2"
        }));
        let index_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": index_view,
            "byteOffset": 0,
            "componentType": COMPONENT_U32,
            "count": mesh.triangle_count() * 3,
            "type": "SCALAR"
        }));

        let mesh_index = meshes.len();
        meshes.push(json!({
            "name": node.anchor.as_str(),
            "primitives": [
                {
                    "attributes": {
                        "POSITION": position_accessor,
                        "NORMAL": normal_accessor,
                        "TEXCOORD_0": texcoord_accessor
                    },
                    "indices": index_accessor,
                    "mode": MODE_TRIANGLES,
                    "material": 0
                }
            ]
        }));

        nodes.push(json!({ "name": node.anchor.as_str(), "mesh": mesh_index }));
    }

    // One material instance shared by every primitive
    let mut image_view = None;
    let mut unlit = true;
    let material_value = match graph.material().map(|m| m.as_ref()) {
        Some(Material::Textured { texture }) => {
            image_view = Some(push_view(&mut buffer, &mut buffer_views, &texture.png, None));
            json!({
                "name": "scan_capture",
                "pbrMetallicRoughness": {
                    "baseColorTexture": { "index": 0 },
                    "metallicFactor": 0.0,
                    "roughnessFactor": 1.0
                },
                "extensions": { "KHR_materials_unlit": {} }
            })
        }
        Some(Material::FlatColor { rgba }) => json!({
            "name": "scan_preview",
            "pbrMetallicRoughness": {
                "baseColorFactor": rgba,
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            },
            "extensions": { "KHR_materials_unlit": {} }
        }),
        None => {
            unlit = false;
            json!({
                "name": "scan_default",
                "pbrMetallicRoughness": {
                    "metallicFactor": 0.0,
                    "roughnessFactor": 1.0
                }
            })
        }
    };

    let mut document = serde_json::Map::new();
    document.insert(
        "asset".to_string(),
        json!({ "generator": "Polyscan", "version": "2.0" }),
    );
    document.insert("scene".to_string(), json!(0));
    document.insert("scenes".to_string(), json!([{ "nodes": [0] }]));
    document.insert("nodes".to_string(), Value::Array(nodes));
    document.insert("materials".to_string(), json!([material_value]));
    if unlit {
        document.insert("extensionsUsed".to_string(), json!(["KHR_materials_unlit"]));
    }
    if !meshes.is_empty() {
        document.insert("meshes".to_string(), Value::Array(meshes));
    }
    if !accessors.is_empty() {
        document.insert("accessors".to_string(), Value::Array(accessors));
    }
    if let Some(image_view) = image_view {
        document.insert(
            "images".to_string(),
            json!([{ "bufferView": image_view, "mimeType": "image/png" }]),
        );
        document.insert(
            "samplers".to_string(),
            json!([{
                "magFilter": FILTER_LINEAR,
                "minFilter": FILTER_LINEAR,
                "wrapS": WRAP_REPEAT,
                "wrapT": WRAP_REPEAT
            }]),
        );
        document.insert("textures".to_string(), json!([{ "sampler": 0, "source": 0 }]));
    }
    if !buffer_views.is_empty() {
        document.insert("bufferViews".to_string(), Value::Array(buffer_views));
    }
    if !buffer.is_empty() {
        document.insert("buffers".to_string(), json!([{ "byteLength": buffer.len() }]));
    }

    Ok((Value::Object(document), buffer))
}

/// Append a 4-byte-aligned buffer view and return its index
fn push_view(
    buffer: &mut Vec<u8>,
    views: &mut Vec<Value>,
    data: &[u8],
    target: Option<u32>,
) -> usize {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
    let offset = buffer.len();
    buffer.extend_from_slice(data);

    let mut view = serde_json::Map::new();
    view.insert("buffer".to_string(), json!(0));
    view.insert("byteOffset".to_string(), json!(offset));
    view.insert("byteLength".to_string(), json!(data.len()));
    if let Some(target) = target {
        view.insert("target".to_string(), json!(target));
    }
    views.push(Value::Object(view));
    views.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{AnchorId, RawSurfacePatch};
    use crate::scene::{assemble, merge_snapshot, TextureResource};
    use nalgebra::{Point3, Vector3};
    use std::sync::Arc;

    fn triangle_patch() -> Arc<RawSurfacePatch> {
        Arc::new(RawSurfacePatch::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Vector3::new(0.0, 0.0, 1.0); 3],
            vec![0, 1, 2],
        ))
    }

    fn textured_graph() -> SceneGraph {
        let snapshot = vec![
            (AnchorId::from("a1"), triangle_patch()),
            (AnchorId::from("a2"), triangle_patch()),
        ];
        let texture = TextureResource {
            width: 2,
            height: 2,
            png: vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0],
        };
        assemble(
            merge_snapshot(&snapshot).forest,
            Material::textured(texture).shared(),
        )
    }

    fn json_chunk(bytes: &[u8]) -> Value {
        assert_eq!(&bytes[0..4], b"glTF");
        let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        serde_json::from_slice(&bytes[20..20 + len]).unwrap()
    }

    #[test]
    fn test_export_header_and_alignment() {
        let bytes = export(&textured_graph()).unwrap();

        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(
            u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize,
            bytes.len()
        );
        let json_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        assert_eq!(json_len % 4, 0);
    }

    #[test]
    fn test_export_is_byte_identical_for_unchanged_graph() {
        let graph = textured_graph();
        assert_eq!(export(&graph).unwrap(), export(&graph).unwrap());
    }

    #[test]
    fn test_export_document_structure() {
        let doc = json_chunk(&export(&textured_graph()).unwrap());

        // root + two anchors, two meshes, one shared material, one image
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(doc["nodes"][1]["name"], "a1");
        assert_eq!(doc["nodes"][2]["name"], "a2");
        assert_eq!(doc["meshes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["materials"].as_array().unwrap().len(), 1);
        assert_eq!(doc["images"].as_array().unwrap().len(), 1);
        assert_eq!(doc["images"][0]["mimeType"], "image/png");
        assert_eq!(doc["meshes"][0]["primitives"][0]["material"], 0);
        assert_eq!(doc["meshes"][1]["primitives"][0]["material"], 0);
        assert!(doc.get("asset").is_some());
        assert_eq!(doc["asset"]["version"], "2.0");
    }

    #[test]
    fn test_export_flat_color_graph_has_no_images() {
        let snapshot = vec![(AnchorId::from("a1"), triangle_patch())];
        let graph = assemble(
            merge_snapshot(&snapshot).forest,
            Material::preview().shared(),
        );
        let doc = json_chunk(&export(&graph).unwrap());

        assert!(doc.get("images").is_none());
        assert!(doc.get("textures").is_none());
        assert!(doc["materials"][0]["pbrMetallicRoughness"]
            .get("baseColorFactor")
            .is_some());
    }

    #[test]
    fn test_export_empty_graph() {
        let graph = assemble(Vec::new(), Material::preview().shared());
        let bytes = export(&graph).unwrap();
        let doc = json_chunk(&bytes);

        assert_eq!(doc["nodes"].as_array().unwrap().len(), 1);
        assert!(doc.get("meshes").is_none());
        assert!(doc.get("buffers").is_none());
    }
}
