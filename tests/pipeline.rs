// End to end: catalog text and pixels in, GLB and USDZ out.

use std::io::{Cursor, Read};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use relief_engine::source::ImageLoader;
use relief_engine::{
    ExportFormat, Exporter, ImageRef, MapSource, ReliefConfig, ReliefPreview, bake, dimensions,
};

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn painting_png() -> Vec<u8> {
    let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, ((x + y) * 3) as u8]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

fn config() -> ReliefConfig {
    let mut config = ReliefConfig::default();
    config.mesh.segments = 16;
    config.mesh.scale_figure = true;
    config
}

#[tokio::test]
async fn catalog_painting_to_exports() {
    let config = config();
    let dims = dimensions::parse_or_default("29 1/8 x 36 1/4 in. (73.7 x 92.1 cm)");
    assert!((dims.width_units() - 0.737).abs() < 1e-6);
    assert!((dims.height_units() - 0.921).abs() < 1e-6);

    let source = ImageRef::local("irises.png", painting_png());
    let pixels = ImageLoader::new(&config.source).unwrap().load(&source).await.unwrap();

    let mut preview = ReliefPreview::new(&config);
    preview.set_source(source, Some(&pixels), dims.clone());
    assert_eq!(preview.enhance(None).await, MapSource::Procedural);

    let mesh = preview.mesh();
    // first catalog number runs vertically
    let (lo, hi) = mesh.canvas.bounds().unwrap();
    assert!((hi[0] - lo[0] - dims.height_units()).abs() < 1e-5);
    assert!((hi[1] - lo[1] - dims.width_units()).abs() < 1e-5);

    let exporter = Exporter::new(config.export.clone());
    let out = tempfile::tempdir().unwrap();

    let glb = exporter.export_binary(mesh, "Irises (1889)").await.unwrap();
    assert_eq!(glb.format, ExportFormat::Glb);
    assert_eq!(glb.filename, "Irises_1889.glb");
    assert_eq!(&glb.bytes[0..4], b"glTF");
    assert_eq!(read_u32(&glb.bytes, 8) as usize, glb.bytes.len());
    std::fs::write(out.path().join(&glb.filename), &glb.bytes).unwrap();

    let usdz = exporter.export_mobile_ar(mesh, "Irises (1889)").await.unwrap();
    assert_eq!(usdz.filename, "Irises_1889.usdz");
    let mut archive = zip::ZipArchive::new(Cursor::new(usdz.bytes.clone())).unwrap();
    let mut layer = String::new();
    archive.by_index(0).unwrap().read_to_string(&mut layer).unwrap();
    assert!(layer.contains("def Xform \"scale_figure\""));
    std::fs::write(out.path().join(&usdz.filename), &usdz.bytes).unwrap();

    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn unparseable_dimensions_still_export() {
    let config = config();
    let dims = dimensions::parse_or_default("Dimensions unavailable");
    assert!((dims.width_units() - 0.5).abs() < 1e-6);
    assert!((dims.height_units() - 0.6).abs() < 1e-6);

    // pixels failed to load
    let mut preview = ReliefPreview::new(&config);
    preview.set_source(ImageRef::remote("https://museum.example/404.jpg"), None, dims);
    assert_eq!(preview.enhance(None).await, MapSource::None);

    let artifact = Exporter::new(config.export.clone()).export_binary(preview.mesh(), "").await.unwrap();
    assert_eq!(artifact.filename, "artwork.glb");
}

#[test]
fn zero_relief_bake_is_a_no_op() {
    let mut config = config();
    config.material.displacement_bias = 0.0;
    let maps = relief_engine::SurfaceMapSet {
        displacement: Some(std::sync::Arc::new(relief_engine::maps::HeightMap::from_linear(image::GrayImage::new(4, 4)))),
        ..Default::default()
    };
    let dims = dimensions::parse_or_default("50 x 60 cm");
    let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4)).to_rgba8();
    let mesh = relief_engine::build(Some(std::sync::Arc::new(image)), &dims, &maps, &(&config).into());

    let baked = bake(&mesh);
    assert!(baked.is_displaced());
    for (a, b) in baked.canvas.positions.iter().zip(&mesh.canvas.positions) {
        assert!((a[2] - b[2]).abs() < 1e-7);
    }
    assert_eq!(bake(&mesh).canvas, baked.canvas);
}
