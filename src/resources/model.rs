//! Model file loader.
//!
//! Reads `.obj`-style text and splits it into object segments at every `o`
//! line. Each segment keeps its raw lines and the lowest index its faces use
//! per attribute channel, so the geometry builder can rebase the file-global
//! face indices onto the segment's own vertex data. Every segment that recorded
//! a face becomes one mesh node directly below an identity root.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    data_structures::{
        material::{MaterialTable, TextureBinding},
        mesh::{Mesh, MeshSegment, VertexRef},
        registry::TextureRegistry,
        scene_graph::{NodeId, SceneGraph, SceneNode},
    },
    error::{Error, Result},
    render::RenderBackend,
    resources::material::load_materials,
};

/// Loads a model file into a scene graph.
///
/// `mtllib` names are resolved against `assets_dir`; the textures of every
/// material they define are uploaded through `backend` and registered.
pub fn load_scene<B: RenderBackend>(
    path: impl AsRef<Path>,
    assets_dir: &Path,
    registry: &mut TextureRegistry<B::Texture>,
    backend: &mut B,
) -> Result<SceneGraph<Mesh>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
    let scene = parse_scene(BufReader::new(file), path, assets_dir, registry, backend)?;
    log::debug!("loaded {} mesh(es) from {}", scene.mesh_count(), path.display());
    Ok(scene)
}

pub fn parse_scene<R: BufRead, B: RenderBackend>(
    reader: R,
    origin: &Path,
    assets_dir: &Path,
    registry: &mut TextureRegistry<B::Texture>,
    backend: &mut B,
) -> Result<SceneGraph<Mesh>> {
    let mut loader = SceneLoader {
        origin,
        graph: SceneGraph::new(),
        root: None,
        materials: MaterialTable::new(),
        bindings: Vec::new(),
        segment: MeshSegment::new("", 1),
    };
    loader.root = Some(loader.graph.add_node(SceneNode::identity(), None)?);

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| Error::file_open(origin, e))?;
        let mut tokens = line.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };
        match directive {
            "mtllib" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::parse(origin, line_no, "missing material library name"))?;
                let table = load_materials(assets_dir.join(name))?;
                for (material_name, material) in &table {
                    material.register_textures(material_name, registry, backend)?;
                }
                loader.materials.extend(table);
            }
            "usemtl" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::parse(origin, line_no, "missing material name"))?;
                loader.use_material(name, line_no);
            }
            "o" => {
                loader.flush()?;
                let name = tokens
                    .next()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("object{}", line_no));
                loader.segment = MeshSegment::new(name, line_no);
            }
            "f" => {
                let refs: Vec<VertexRef> = tokens
                    .take_while(|token| !token.starts_with('#'))
                    .map(VertexRef::parse)
                    .collect();
                if refs.len() < 3 {
                    return Err(Error::parse(
                        origin,
                        line_no,
                        "missing inner part of a face, need at least three vertices",
                    ));
                }
                loader.segment.record_face(&refs);
            }
            _ => (),
        }
        loader.segment.push_line(line_no, &line);
    }
    loader.flush()?;

    Ok(loader.graph)
}

struct SceneLoader<'a> {
    origin: &'a Path,
    graph: SceneGraph<Mesh>,
    root: Option<NodeId>,
    materials: MaterialTable,
    bindings: Vec<TextureBinding>,
    segment: MeshSegment,
}

impl SceneLoader<'_> {
    fn use_material(&mut self, name: &str, line_no: usize) {
        self.bindings = match self.materials.get(name) {
            Some(material) => material.texture_bindings(name),
            None => {
                log::warn!(
                    "{}:{}: unknown material {}, no textures bound",
                    self.origin.display(),
                    line_no,
                    name
                );
                Vec::new()
            }
        };
    }

    /// Turns the open segment into a mesh node if it recorded any face.
    fn flush(&mut self) -> Result<()> {
        let segment = std::mem::take(&mut self.segment);
        if !segment.has_faces() {
            return Ok(());
        }
        let name = segment.name().to_string();
        let mesh = segment
            .materialize(self.bindings.clone())
            .map_err(|e| Error::parse(self.origin, e.line, format!("object {}: {}", name, e.message)))?;
        log::debug!(
            "object {}: {} vertices, {} triangles",
            mesh.name,
            mesh.data.vertices.len(),
            mesh.data.triangle_count()
        );
        self.graph.add_node(SceneNode::mesh(mesh), self.root)?;
        Ok(())
    }
}
