// gltf.rs - Binary glTF 2.0 writer
//
// One buffer holds every vertex stream, index list and PNG texture. The
// canvas and each decor part become their own node under a single root, so
// viewers can toggle them. Nothing outside core glTF 2.0 is used.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ExportFormat, encode_png};
use crate::bake::BakedRelief;
use crate::error::Result;
use crate::mesh::{Geometry, SolidMaterial, SurfaceMaterial};

/// Largest file the GLB header's u32 length field can describe
pub const GLB_SIZE_LIMIT: usize = u32::MAX as usize;

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const TRIANGLES: u32 = 4;

const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

/// Serialize `baked` as GLB, or as text glTF when the GLB would exceed `limit` bytes.
pub fn write_gltf(baked: &BakedRelief, limit: usize) -> Result<(Vec<u8>, ExportFormat)> {
    let mut doc = Document::default();

    let canvas_material = doc.push_canvas_material(&baked.material)?;
    let canvas = doc.push_mesh("canvas", &baked.canvas, canvas_material);
    let mut children = vec![canvas];

    let mut solids: HashMap<&'static str, usize> = HashMap::new();
    for group in &baked.decor {
        let mut parts = Vec::with_capacity(group.parts.len());
        for part in &group.parts {
            let material = *solids
                .entry(part.material.name)
                .or_insert_with(|| doc.push_solid_material(&part.material));
            parts.push(doc.push_mesh(&part.name, &part.geometry, material));
        }
        children.push(doc.push_node(json!({ "name": group.kind.name(), "children": parts })));
    }
    let root = doc.push_node(json!({ "name": "relief", "children": children }));

    debug!(
        nodes = doc.nodes.len(),
        textures = doc.textures.len(),
        buffer_bytes = doc.buffer.len(),
        displaced = baked.is_displaced(),
        "assembled glTF document"
    );

    let (json, buffer) = doc.finish(root);
    assemble(json, buffer, limit)
}

#[derive(Default)]
struct Document {
    buffer: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
    images: Vec<Value>,
    textures: Vec<Value>,
    materials: Vec<Value>,
    meshes: Vec<Value>,
    nodes: Vec<Value>,
}

impl Document {
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>, stride: Option<usize>) -> usize {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.buffer.resize(self.buffer.len().next_multiple_of(4), 0);

        let mut view = json!({ "buffer": 0, "byteOffset": offset, "byteLength": bytes.len() });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        if let Some(stride) = stride {
            view["byteStride"] = json!(stride);
        }
        self.views.push(view);
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn push_node(&mut self, node: Value) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn push_primitive(&mut self, g: &Geometry) -> Value {
        let positions: Vec<u8> = g.positions.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
        let normals: Vec<u8> = g.normals.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
        let uvs: Vec<u8> = g.uvs.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
        let indices: Vec<u8> = g.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let (min, max) = g.bounds().unwrap_or(([0.0; 3], [0.0; 3]));
        let count = g.vertex_count();

        let view = self.push_view(&positions, Some(ARRAY_BUFFER), Some(12));
        let position = self.push_accessor(json!({
            "bufferView": view, "componentType": FLOAT, "count": count, "type": "VEC3",
            "min": min, "max": max,
        }));
        let view = self.push_view(&normals, Some(ARRAY_BUFFER), Some(12));
        let normal = self.push_accessor(json!({
            "bufferView": view, "componentType": FLOAT, "count": count, "type": "VEC3",
        }));
        let view = self.push_view(&uvs, Some(ARRAY_BUFFER), Some(8));
        let uv = self.push_accessor(json!({
            "bufferView": view, "componentType": FLOAT, "count": count, "type": "VEC2",
        }));
        let view = self.push_view(&indices, Some(ELEMENT_ARRAY_BUFFER), None);
        let index = self.push_accessor(json!({
            "bufferView": view, "componentType": UNSIGNED_INT, "count": g.indices.len(), "type": "SCALAR",
        }));

        json!({
            "attributes": { "POSITION": position, "NORMAL": normal, "TEXCOORD_0": uv },
            "indices": index,
            "mode": TRIANGLES,
        })
    }

    fn push_mesh(&mut self, name: &str, g: &Geometry, material: usize) -> usize {
        let mut primitive = self.push_primitive(g);
        primitive["material"] = json!(material);
        self.meshes.push(json!({ "name": name, "primitives": [primitive] }));
        let mesh = self.meshes.len() - 1;
        self.push_node(json!({ "name": name, "mesh": mesh }))
    }

    fn push_texture(&mut self, img: &DynamicImage) -> Result<usize> {
        let png = encode_png(img)?;
        let view = self.push_view(&png, None, None);
        self.images.push(json!({ "bufferView": view, "mimeType": "image/png" }));
        self.textures.push(json!({ "sampler": 0, "source": self.images.len() - 1 }));
        Ok(self.textures.len() - 1)
    }

    fn push_canvas_material(&mut self, m: &SurfaceMaterial) -> Result<usize> {
        let mut pbr = json!({
            "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
            "metallicFactor": m.metalness,
            "roughnessFactor": m.roughness,
        });
        let mut material = json!({ "name": "canvas", "doubleSided": false });

        if let Some(base) = &m.base_color {
            let tex = self.push_texture(&DynamicImage::ImageRgba8((**base).clone()))?;
            pbr["baseColorTexture"] = json!({ "index": tex });
        }
        if let Some(rough) = &m.roughness_map {
            // glTF packs roughness in G and metalness in B
            let metal = (m.metalness.clamp(0.0, 1.0) * 255.0).round() as u8;
            let packed = RgbImage::from_fn(rough.width(), rough.height(), |x, y| {
                Rgb([255, rough.get_pixel(x, y)[0], metal])
            });
            let tex = self.push_texture(&DynamicImage::ImageRgb8(packed))?;
            pbr["metallicRoughnessTexture"] = json!({ "index": tex });
            pbr["metallicFactor"] = json!(1.0);
            pbr["roughnessFactor"] = json!(1.0);
        }
        if let Some(normal) = &m.normal_map {
            let tex = self.push_texture(&DynamicImage::ImageRgb8((**normal).clone()))?;
            material["normalTexture"] = json!({ "index": tex, "scale": m.normal_scale });
        }

        material["pbrMetallicRoughness"] = pbr;
        self.materials.push(material);
        Ok(self.materials.len() - 1)
    }

    fn push_solid_material(&mut self, m: &SolidMaterial) -> usize {
        self.materials.push(json!({
            "name": m.name,
            "pbrMetallicRoughness": {
                "baseColorFactor": m.color,
                "metallicFactor": m.metalness,
                "roughnessFactor": m.roughness,
            },
        }));
        self.materials.len() - 1
    }

    fn finish(self, root: usize) -> (Value, Vec<u8>) {
        let mut json = json!({
            "asset": { "generator": concat!("relief-engine ", env!("CARGO_PKG_VERSION")), "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [root] }],
            "nodes": self.nodes,
            "meshes": self.meshes,
            "materials": self.materials,
            "accessors": self.accessors,
            "bufferViews": self.views,
            "buffers": [{ "byteLength": self.buffer.len() }],
        });
        if !self.textures.is_empty() {
            json["textures"] = Value::Array(self.textures);
            json["images"] = Value::Array(self.images);
            json["samplers"] = json!([{
                "magFilter": 9729,  // LINEAR
                "minFilter": 9987,  // LINEAR_MIPMAP_LINEAR
                "wrapS": 33071,     // CLAMP_TO_EDGE
                "wrapT": 33071,
            }]);
        }
        (json, self.buffer)
    }
}

fn assemble(mut json: Value, buffer: Vec<u8>, limit: usize) -> Result<(Vec<u8>, ExportFormat)> {
    let json_bytes = serde_json::to_vec(&json)?;
    let json_padding = json_bytes.len().next_multiple_of(4) - json_bytes.len();
    let padded_json_len = json_bytes.len() + json_padding;
    let bin_padding = buffer.len().next_multiple_of(4) - buffer.len();
    let padded_bin_len = buffer.len() + bin_padding;
    let total_length = 12 + 8 + padded_json_len + 8 + padded_bin_len;

    if total_length > limit {
        warn!(total_length, limit, "scene too large for GLB; writing text glTF instead");
        json["buffers"][0]["uri"] = json!(format!(
            "data:application/octet-stream;base64,{}",
            STANDARD.encode(&buffer)
        ));
        return Ok((serde_json::to_vec(&json)?, ExportFormat::GltfText));
    }

    let mut glb = Vec::with_capacity(total_length);

    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    glb.extend_from_slice(&(padded_bin_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    glb.extend_from_slice(&buffer);
    glb.extend(std::iter::repeat_n(0u8, bin_padding));

    Ok((glb, ExportFormat::Glb))
}
