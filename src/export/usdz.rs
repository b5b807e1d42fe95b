// usdz.rs - USDZ package for mobile AR viewers
//
// The package is an uncompressed zip whose first entry is the USDA layer.
// Every entry's data starts on a 64-byte boundary so viewers can map the
// archive directly. The layer anchors the root on vertical planes so the
// piece lands on a wall.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use image::DynamicImage;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{bound_texture, encode_png};
use crate::bake::BakedRelief;
use crate::error::Result;
use crate::mesh::{Geometry, SolidMaterial, SurfaceMaterial, Vec3};

const SCENE_FILE: &str = "scene.usda";
const BASE_COLOR_FILE: &str = "textures/base_color.png";
const NORMAL_FILE: &str = "textures/normal.png";
const ROUGHNESS_FILE: &str = "textures/roughness.png";
const ALIGNMENT: u16 = 64;

const MATERIALS: &str = "/Relief/Materials";

struct Texture {
    path: &'static str,
    png: Vec<u8>,
}

/// Package `baked` as USDZ, with no texture edge longer than `max_texture`.
pub fn write_usdz(baked: &BakedRelief, max_texture: u32) -> Result<Vec<u8>> {
    let m = &baked.material;
    let mut textures = Vec::new();

    if let Some(base) = &m.base_color {
        let img = bound_texture(DynamicImage::ImageRgba8((**base).clone()), max_texture);
        textures.push(Texture { path: BASE_COLOR_FILE, png: encode_png(&img)? });
    }
    if let Some(normal) = &m.normal_map {
        let img = bound_texture(DynamicImage::ImageRgb8((**normal).clone()), max_texture);
        textures.push(Texture { path: NORMAL_FILE, png: encode_png(&img)? });
    }
    if let Some(rough) = &m.roughness_map {
        let img = bound_texture(DynamicImage::ImageLuma8((**rough).clone()), max_texture);
        textures.push(Texture { path: ROUGHNESS_FILE, png: encode_png(&img)? });
    }

    let usda = scene_layer(baked);
    debug!(layer_bytes = usda.len(), textures = textures.len(), "writing usdz package");
    package(&usda, &textures)
}

fn package(usda: &str, textures: &[Texture]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file_aligned(SCENE_FILE, options, ALIGNMENT)?;
    zip.write_all(usda.as_bytes())?;
    for texture in textures {
        zip.start_file_aligned(texture.path, options, ALIGNMENT)?;
        zip.write_all(&texture.png)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn scene_layer(baked: &BakedRelief) -> String {
    let mut out = String::from(concat!(
        "#usda 1.0\n",
        "(\n",
        "    customLayerData = {\n",
        "        string creator = \"relief-engine ", env!("CARGO_PKG_VERSION"), "\"\n",
        "    }\n",
        "    defaultPrim = \"Relief\"\n",
        "    metersPerUnit = 1\n",
        "    upAxis = \"Y\"\n",
        ")\n\n",
        "def Xform \"Relief\" (\n",
        "    prepend apiSchemas = [\"Preliminary_AnchoringAPI\"]\n",
        "    kind = \"component\"\n",
        ")\n{\n",
        "    token preliminary:anchoring:type = \"plane\"\n",
        "    token preliminary:planeAnchoring:alignment = \"vertical\"\n\n",
        "    def Scope \"Materials\"\n    {\n",
    ));

    canvas_material(&mut out, &baked.material);
    let solids: BTreeMap<&str, SolidMaterial> = baked
        .decor
        .iter()
        .flat_map(|g| &g.parts)
        .map(|p| (p.material.name, p.material))
        .collect();
    for material in solids.values() {
        solid_material(&mut out, material);
    }
    out.push_str("    }\n\n");

    mesh_prim(&mut out, 1, "Canvas", &baked.canvas, &format!("{MATERIALS}/Canvas"), true);

    for group in &baked.decor {
        out.push_str(&format!("\n    def Xform \"{}\"\n    {{\n", group.kind.name()));
        for part in &group.parts {
            mesh_prim(&mut out, 2, &part.name, &part.geometry, &format!("{MATERIALS}/{}", part.material.name), false);
        }
        out.push_str("    }\n");
    }

    out.push_str("}\n");
    out
}

fn canvas_material(out: &mut String, m: &SurfaceMaterial) {
    let path = format!("{MATERIALS}/Canvas");
    let st = format!("<{path}/StReader.outputs:result>");
    let mut surface = String::new();
    let mut shaders = String::new();

    let mut texture = |name: &str, file: &str, color_space: &str, output: &str, extra: &str| {
        shaders.push_str(&format!(
            "\n            def Shader \"{name}\"\n            {{\n\
             \x20               uniform token info:id = \"UsdUVTexture\"\n\
             \x20               asset inputs:file = @{file}@\n\
             \x20               float2 inputs:st.connect = {st}\n\
             \x20               token inputs:sourceColorSpace = \"{color_space}\"\n\
             \x20               token inputs:wrapS = \"clamp\"\n\
             \x20               token inputs:wrapT = \"clamp\"\n\
             {extra}\
             \x20               {output}\n\
             \x20           }}\n"
        ));
    };

    if m.base_color.is_some() {
        surface.push_str(&format!("                color3f inputs:diffuseColor.connect = <{path}/BaseColor.outputs:rgb>\n"));
        texture("BaseColor", BASE_COLOR_FILE, "sRGB", "float3 outputs:rgb", "");
    } else {
        surface.push_str("                color3f inputs:diffuseColor = (0.8, 0.8, 0.8)\n");
    }
    if m.normal_map.is_some() {
        let s = m.normal_scale;
        surface.push_str(&format!("                normal3f inputs:normal.connect = <{path}/Normal.outputs:rgb>\n"));
        let remap = format!(
            "                float4 inputs:scale = ({}, {}, 2, 1)\n                float4 inputs:bias = ({}, {}, -1, 0)\n",
            2.0 * s,
            2.0 * s,
            -s,
            -s
        );
        texture("Normal", NORMAL_FILE, "raw", "float3 outputs:rgb", &remap);
    }
    if m.roughness_map.is_some() {
        surface.push_str(&format!("                float inputs:roughness.connect = <{path}/Roughness.outputs:r>\n"));
        texture("Roughness", ROUGHNESS_FILE, "raw", "float outputs:r", "");
    } else {
        surface.push_str(&format!("                float inputs:roughness = {}\n", m.roughness));
    }

    out.push_str(&format!(
        "        def Material \"Canvas\"\n        {{\n\
         \x20           token outputs:surface.connect = <{path}/Surface.outputs:surface>\n\n\
         \x20           def Shader \"Surface\"\n            {{\n\
         \x20               uniform token info:id = \"UsdPreviewSurface\"\n\
         {surface}\
         \x20               float inputs:metallic = {metal}\n\
         \x20               token outputs:surface\n\
         \x20           }}\n\n\
         \x20           def Shader \"StReader\"\n            {{\n\
         \x20               uniform token info:id = \"UsdPrimvarReader_float2\"\n\
         \x20               token inputs:varname = \"st\"\n\
         \x20               float2 outputs:result\n\
         \x20           }}\n\
         {shaders}\
         \x20       }}\n",
        metal = m.metalness,
    ));
}

fn solid_material(out: &mut String, m: &SolidMaterial) {
    let [r, g, b, _] = m.color;
    out.push_str(&format!(
        "\n        def Material \"{name}\"\n        {{\n\
         \x20           token outputs:surface.connect = <{MATERIALS}/{name}/Surface.outputs:surface>\n\n\
         \x20           def Shader \"Surface\"\n            {{\n\
         \x20               uniform token info:id = \"UsdPreviewSurface\"\n\
         \x20               color3f inputs:diffuseColor = ({r}, {g}, {b})\n\
         \x20               float inputs:roughness = {rough}\n\
         \x20               float inputs:metallic = {metal}\n\
         \x20               token outputs:surface\n\
         \x20           }}\n\
         \x20       }}\n",
        name = m.name,
        rough = m.roughness,
        metal = m.metalness,
    ));
}

fn mesh_prim(out: &mut String, depth: usize, name: &str, g: &Geometry, material: &str, with_st: bool) {
    let pad = "    ".repeat(depth);
    let (lo, hi) = g.bounds().unwrap_or(([0.0; 3], [0.0; 3]));

    out.push_str(&format!("{pad}def Mesh \"{name}\" (\n{pad}    prepend apiSchemas = [\"MaterialBindingAPI\"]\n{pad})\n{pad}{{\n"));
    out.push_str(&format!("{pad}    float3[] extent = [{}, {}]\n", tuple3(lo), tuple3(hi)));
    out.push_str(&format!("{pad}    int[] faceVertexCounts = [{}]\n", vec!["3"; g.triangle_count()].join(", ")));
    out.push_str(&format!("{pad}    int[] faceVertexIndices = [{}]\n", join(g.indices.iter().map(u32::to_string))));
    out.push_str(&format!("{pad}    rel material:binding = <{material}>\n"));
    out.push_str(&format!(
        "{pad}    normal3f[] normals = [{}] (\n{pad}        interpolation = \"vertex\"\n{pad}    )\n",
        join(g.normals.iter().map(|n| tuple3(*n)))
    ));
    out.push_str(&format!("{pad}    point3f[] points = [{}]\n", join(g.positions.iter().map(|p| tuple3(*p)))));
    if with_st {
        // USD texture space has t pointing up
        out.push_str(&format!(
            "{pad}    texCoord2f[] primvars:st = [{}] (\n{pad}        interpolation = \"vertex\"\n{pad}    )\n",
            join(g.uvs.iter().map(|[u, v]| format!("({u}, {})", 1.0 - v)))
        ));
    }
    out.push_str(&format!("{pad}    uniform token subdivisionScheme = \"none\"\n{pad}}}\n"));
}

fn tuple3(v: Vec3) -> String {
    format!("({}, {}, {})", v[0], v[1], v[2])
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
