use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub const MESH_EXTENSION: &str = ".glb";

type Mat4 = [[f64; 4]; 4];

const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("{0}")]
    Gltf(#[from] gltf::Error),
    #[error("scene contains no geometry")]
    NoGeometry,
}

/// Axis-aligned extent of one mesh file.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSize {
    pub size: [f64; 3],
    pub max_dim: f64,
}

pub struct MeshReport {
    pub file: String,
    pub result: Result<MeshSize, MeshError>,
}

impl fmt::Display for MeshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(m) => write!(
                f,
                "{}: size = [{} {} {}], max dim = {}",
                self.file, m.size[0], m.size[1], m.size[2], m.max_dim
            ),
            Err(e) => write!(f, "{}: error {}", self.file, e),
        }
    }
}

/// Running world-space bounds.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: [f64; 3],
    max: [f64; 3],
}

impl Bounds {
    fn empty() -> Self {
        Bounds {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    fn include(&mut self, point: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }

    fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Measure every `.glb` file directly inside `dir`, in listing order.
/// Per-file failures end up in the report; only an unreadable directory
/// fails the whole call.
pub fn measure_dir(dir: &Path) -> Result<Vec<MeshReport>> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(MESH_EXTENSION) {
            files.push((name, entry.path()));
        } else {
            debug!("Skipping {}", name);
        }
    }

    Ok(measure_files(files))
}

#[cfg(feature = "rayon")]
fn measure_files(files: Vec<(String, PathBuf)>) -> Vec<MeshReport> {
    files
        .into_par_iter()
        .map(|(file, path)| measure_one(file, &path))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn measure_files(files: Vec<(String, PathBuf)>) -> Vec<MeshReport> {
    files
        .into_iter()
        .map(|(file, path)| measure_one(file, &path))
        .collect()
}

fn measure_one(file: String, path: &Path) -> MeshReport {
    let result = measure_file(path);
    if let Err(e) = &result {
        warn!("Failed to measure {}: {}", file, e);
    }
    MeshReport { file, result }
}

pub fn measure_file(path: &Path) -> Result<MeshSize, MeshError> {
    let gltf = gltf::Gltf::open(path)?;
    let buffers = gltf::import_buffers(&gltf.document, path.parent(), gltf.blob.clone())?;
    let bounds = scene_bounds(&gltf.document, &buffers);
    if bounds.is_empty() {
        return Err(MeshError::NoGeometry);
    }

    let size = bounds.size();
    let max_dim = size.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(MeshSize { size, max_dim })
}

/// Bounds of the default scene (or the first, or every root node when the
/// file declares no scenes) with node transforms applied.
fn scene_bounds(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Bounds {
    let mut bounds = Bounds::empty();
    let scene = document.default_scene().or_else(|| document.scenes().next());

    match scene {
        Some(scene) => {
            for node in scene.nodes() {
                visit(&node, &IDENTITY, buffers, &mut bounds);
            }
        }
        None => {
            let children: Vec<usize> = document
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .collect();
            for node in document.nodes().filter(|n| !children.contains(&n.index())) {
                visit(&node, &IDENTITY, buffers, &mut bounds);
            }
        }
    }

    bounds
}

fn visit(node: &gltf::Node, parent: &Mat4, buffers: &[gltf::buffer::Data], bounds: &mut Bounds) {
    let world = mul(parent, &to_f64(node.transform().matrix()));

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            if let Some(positions) = reader.read_positions() {
                for p in positions {
                    bounds.include(transform_point(&world, p));
                }
            }
        }
    }

    for child in node.children() {
        visit(&child, &world, buffers, bounds);
    }
}

fn to_f64(m: [[f32; 4]; 4]) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (col, src) in out.iter_mut().zip(m.iter()) {
        for (dst, v) in col.iter_mut().zip(src.iter()) {
            *dst = *v as f64;
        }
    }
    out
}

// Column-major, as glTF stores them: m[col][row].
fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            out[col][row] = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

fn transform_point(m: &Mat4, p: [f32; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (row, v) in out.iter_mut().enumerate() {
        *v = m[0][row] * p[0] as f64 + m[1][row] * p[1] as f64 + m[2][row] * p[2] as f64 + m[3][row];
    }
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    /// Minimal binary glTF: one triangle-list mesh on one node.
    fn glb(positions: &[[f32; 3]], node: serde_json::Value) -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        for p in positions {
            for v in p {
                bin.extend_from_slice(&v.to_le_bytes());
            }
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for p in positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        let doc = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [node],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "buffers": [{ "byteLength": bin.len() }],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": bin.len() }],
            "accessors": [{
                "bufferView": 0,
                "componentType": 5126,
                "count": positions.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            }]
        });
        let mut json_chunk = serde_json::to_vec(&doc).unwrap();
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_chunk);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.5]];

    fn triangle_glb() -> Vec<u8> {
        glb(&TRIANGLE, json!({ "mesh": 0 }))
    }

    #[test]
    fn plain_triangle_extent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tri.glb");
        std::fs::write(&path, triangle_glb()).unwrap();

        let m = measure_file(&path).unwrap();
        assert_eq!(m.size, [2.0, 1.0, 0.5]);
        assert_eq!(m.max_dim, 2.0);
    }

    #[test]
    fn node_scale_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scaled.glb");
        let bytes = glb(&TRIANGLE, json!({ "mesh": 0, "scale": [1.0, 4.0, 1.0], "translation": [10.0, 0.0, 0.0] }));
        std::fs::write(&path, bytes).unwrap();

        let m = measure_file(&path).unwrap();
        assert_eq!(m.size, [2.0, 4.0, 0.5]);
        assert_eq!(m.max_dim, 4.0);
    }

    #[test]
    fn only_lowercase_glb_measured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.glb"), triangle_glb()).unwrap();
        std::fs::write(dir.path().join("b.txt"), "notes").unwrap();
        std::fs::write(dir.path().join("c.GLB"), triangle_glb()).unwrap();

        let reports = measure_dir(dir.path()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].file, "a.glb");
        assert!(reports[0].result.is_ok());
        assert_eq!(reports[0].to_string(), "a.glb: size = [2 1 0.5], max dim = 2");
    }

    #[test]
    fn broken_file_reported_once_and_others_continue() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.glb"), b"definitely not a mesh").unwrap();
        std::fs::write(dir.path().join("good.glb"), triangle_glb()).unwrap();

        let reports = measure_dir(dir.path()).unwrap();
        assert_eq!(reports.len(), 2);

        let lines: Vec<String> = reports.iter().map(|r| r.to_string()).collect();
        let errors: Vec<&String> = lines.iter().filter(|l| l.contains(": error ")).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("bad.glb: error "));
        assert!(lines.iter().any(|l| l.starts_with("good.glb: size = ")));
    }

    #[test]
    fn empty_scene_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.glb");
        let bytes = glb(&TRIANGLE, json!({ "name": "no mesh here" }));
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(measure_file(&path), Err(MeshError::NoGeometry)));
    }

    #[test]
    fn missing_dir_fails_whole_run() {
        let dir = TempDir::new().unwrap();
        assert!(measure_dir(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn matrix_composition() {
        let mut scale = IDENTITY;
        scale[0][0] = 3.0;
        let mut shift = IDENTITY;
        shift[3][0] = 1.0;
        // shift after scale
        let m = mul(&shift, &scale);
        assert_eq!(transform_point(&m, [2.0, 5.0, 0.0]), [7.0, 5.0, 0.0]);
    }
}
