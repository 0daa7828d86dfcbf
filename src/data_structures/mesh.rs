//! Mesh segments and the geometry builder.
//!
//! The model loader accumulates the raw text of each object segment together
//! with the lowest index it saw per attribute channel. Turning that text into
//! vertex and index data happens here, once the segment is closed.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::data_structures::material::TextureBinding;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl ModelVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// `atoi`-style conversion: optional sign and leading digits, anything else is 0.
fn atoi(token: &str) -> i64 {
    let token = token.trim_start();
    let (sign, digits) = match token.as_bytes().first() {
        Some(b'-') => (-1, &token[1..]),
        Some(b'+') => (1, &token[1..]),
        _ => (1, token),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    sign * value
}

/// One `pos[/tex[/norm]]` reference of a face, converted to 0-based indices.
///
/// Empty components and components that convert below zero are `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VertexRef {
    pub position: Option<u32>,
    pub tex_coords: Option<u32>,
    pub normal: Option<u32>,
}

impl VertexRef {
    pub fn parse(token: &str) -> Self {
        let mut components = token.split('/').map(|component| {
            if component.is_empty() {
                return None;
            }
            u32::try_from(atoi(component) - 1).ok()
        });
        Self {
            position: components.next().flatten(),
            tex_coords: components.next().flatten(),
            normal: components.next().flatten(),
        }
    }
}

/// Lowest 0-based index seen per attribute channel within one segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OffsetFloors {
    pub position: Option<u32>,
    pub tex_coords: Option<u32>,
    pub normal: Option<u32>,
}

impl OffsetFloors {
    /// True until a face supplied at least one index.
    pub fn is_unset(&self) -> bool {
        self.position.is_none() && self.tex_coords.is_none() && self.normal.is_none()
    }

    pub fn record(&mut self, vertex: &VertexRef) {
        fn lower(floor: &mut Option<u32>, index: Option<u32>) {
            if let Some(index) = index {
                *floor = Some(floor.map_or(index, |floor| floor.min(index)));
            }
        }
        lower(&mut self.position, vertex.position);
        lower(&mut self.tex_coords, vertex.tex_coords);
        lower(&mut self.normal, vertex.normal);
    }
}

/// An object segment that is still being read.
#[derive(Clone, Debug, Default)]
pub struct MeshSegment {
    name: String,
    line: usize,
    source: String,
    // file line of every line in `source`
    line_numbers: Vec<usize>,
    offsets: OffsetFloors,
    faces: usize,
}

impl MeshSegment {
    /// `line` is where the segment started, used for error reporting.
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offsets(&self) -> OffsetFloors {
        self.offsets
    }

    /// Appends one line of the model file, `line_no` being its position there.
    pub fn push_line(&mut self, line_no: usize, line: &str) {
        self.source.push_str(line);
        self.source.push('\n');
        self.line_numbers.push(line_no);
    }

    pub fn record_face(&mut self, vertices: &[VertexRef]) {
        vertices.iter().for_each(|vertex| self.offsets.record(vertex));
        self.faces += 1;
    }

    /// Counts face lines, whether or not their references resolved to an index.
    pub fn has_faces(&self) -> bool {
        self.faces > 0
    }

    /// Build the geometry and attach the texture names to bind.
    ///
    /// Error lines are translated back to lines of the model file.
    pub fn materialize(self, textures: Vec<TextureBinding>) -> Result<Mesh, GeometryError> {
        let data = MeshData::build(&self.source, self.offsets).map_err(|e| GeometryError {
            line: e
                .line
                .checked_sub(1)
                .and_then(|idx| self.line_numbers.get(idx).copied())
                .unwrap_or(self.line),
            message: e.message,
        })?;
        Ok(Mesh {
            name: self.name,
            offsets: self.offsets,
            data,
            textures,
        })
    }
}

/// A closed segment with its geometry built.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub offsets: OffsetFloors,
    pub data: MeshData,
    pub textures: Vec<TextureBinding>,
}

/// Error of the geometry builder; `line` counts lines of the segment text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometryError {
    pub line: usize,
    pub message: String,
}

impl GeometryError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Build vertex and index data from segment text.
    ///
    /// Face indices are global to the file; subtracting `offsets` rebases them
    /// onto the `v`/`vt`/`vn` lines of this segment. Polygons are fanned into
    /// triangles and every distinct `pos/tex/norm` triple becomes one vertex.
    pub fn build(source: &str, offsets: OffsetFloors) -> Result<Self, GeometryError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut faces: Vec<(usize, Vec<VertexRef>)> = Vec::new();

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => positions.push(parse_floats::<3>(&mut tokens, 3, line_no, "v")?),
                Some("vt") => tex_coords.push(parse_floats::<2>(&mut tokens, 1, line_no, "vt")?),
                Some("vn") => normals.push(parse_floats::<3>(&mut tokens, 3, line_no, "vn")?),
                Some("f") => {
                    let refs: Vec<VertexRef> = tokens
                        .take_while(|token| !token.starts_with('#'))
                        .map(VertexRef::parse)
                        .collect();
                    if refs.len() < 3 {
                        return Err(GeometryError::new(line_no, "face needs at least three vertices"));
                    }
                    faces.push((line_no, refs));
                }
                _ => (),
            }
        }

        let rebase = |index: Option<u32>, floor: Option<u32>, len: usize, line_no: usize, what: &str| {
            let Some(index) = index else {
                return Ok(None);
            };
            let local = floor
                .and_then(|floor| index.checked_sub(floor))
                .map(|local| local as usize)
                .filter(|&local| local < len);
            match local {
                Some(local) => Ok(Some(local)),
                None => Err(GeometryError::new(
                    line_no,
                    format!("{} index {} is out of range for this object", what, index + 1),
                )),
            }
        };

        let mut vertices: Vec<ModelVertex> = Vec::new();
        let mut without_normal: Vec<bool> = Vec::new();
        let mut lookup: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
        let mut indices: Vec<u32> = Vec::new();

        for (line_no, refs) in &faces {
            let mut polygon = Vec::with_capacity(refs.len());
            for vertex in refs {
                if vertex.position.is_none() {
                    return Err(GeometryError::new(*line_no, "face vertex has no position"));
                }
                let p = rebase(vertex.position, offsets.position, positions.len(), *line_no, "position")?
                    .unwrap_or_default();
                let t = rebase(vertex.tex_coords, offsets.tex_coords, tex_coords.len(), *line_no, "texture coordinate")?;
                let n = rebase(vertex.normal, offsets.normal, normals.len(), *line_no, "normal")?;
                let index = *lookup.entry((p, t, n)).or_insert_with(|| {
                    let uv = t.map_or([0.0, 0.0], |t| tex_coords[t]);
                    vertices.push(ModelVertex {
                        position: positions[p],
                        tex_coords: [uv[0], 1.0 - uv[1]],
                        normal: n.map_or([0.0; 3], |n| normals[n]),
                        // We'll calculate these later
                        tangent: [0.0; 3],
                        bitangent: [0.0; 3],
                    });
                    without_normal.push(n.is_none());
                    (vertices.len() - 1) as u32
                });
                polygon.push(index);
            }
            for i in 1..polygon.len() - 1 {
                indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
            }
        }

        if without_normal.iter().any(|&missing| missing) {
            compute_normals(&mut vertices, &indices, &without_normal);
        }
        compute_tangents(&mut vertices, &indices);

        Ok(Self { vertices, indices })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn parse_floats<const N: usize>(
    tokens: &mut std::str::SplitWhitespace<'_>,
    required: usize,
    line_no: usize,
    directive: &str,
) -> Result<[f32; N], GeometryError> {
    let mut values = [0.0; N];
    for (i, value) in values.iter_mut().enumerate() {
        match tokens.next() {
            Some(token) => {
                *value = token.parse().map_err(|_| {
                    GeometryError::new(line_no, format!("invalid number '{}' in {}", token, directive))
                })?
            }
            None if i < required => {
                return Err(GeometryError::new(line_no, format!("missing value in {}", directive)));
            }
            None => break,
        }
    }
    Ok(values)
}

/// Accumulate face normals into vertices that didn't reference one.
fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32], without_normal: &[bool]) {
    for c in indices.chunks_exact(3) {
        let pos0: cgmath::Vector3<f32> = vertices[c[0] as usize].position.into();
        let pos1: cgmath::Vector3<f32> = vertices[c[1] as usize].position.into();
        let pos2: cgmath::Vector3<f32> = vertices[c[2] as usize].position.into();
        let face_normal = (pos1 - pos0).cross(pos2 - pos0);
        for &i in c {
            let i = i as usize;
            if without_normal[i] {
                vertices[i].normal = (cgmath::Vector3::from(vertices[i].normal) + face_normal).into();
            }
        }
    }
    for (vertex, _) in vertices.iter_mut().zip(without_normal).filter(|(_, missing)| **missing) {
        let normal = cgmath::Vector3::from(vertex.normal);
        if cgmath::InnerSpace::magnitude2(normal) > f32::EPSILON {
            vertex.normal = cgmath::InnerSpace::normalize(normal).into();
        }
    }
}

/// OBJ data doesn't come with tangents and bitangents, normal maps need them.
fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let v0 = vertices[c[0] as usize];
        let v1 = vertices[c[1] as usize];
        let v2 = vertices[c[2] as usize];

        let pos0: cgmath::Vector3<_> = v0.position.into();
        let pos1: cgmath::Vector3<_> = v1.position.into();
        let pos2: cgmath::Vector3<_> = v2.position.into();

        let uv0: cgmath::Vector2<_> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<_> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<_> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solving
        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            // no usable texture mapping on this triangle
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // flipped for right-handed normal maps with wgpu texture coordinates
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for &i in c {
            let v = &mut vertices[i as usize];
            v.tangent = (tangent + cgmath::Vector3::from(v.tangent)).into();
            v.bitangent = (bitangent + cgmath::Vector3::from(v.bitangent)).into();
            triangles_included[i as usize] += 1;
        }
    }

    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            continue;
        }
        let denom = 1.0 / n as f32;
        v.tangent = (cgmath::Vector3::from(v.tangent) * denom).into();
        v.bitangent = (cgmath::Vector3::from(v.bitangent) * denom).into();
    }
}

/// Vertex and index buffers of one mesh on the GPU.
#[derive(Clone, Debug)]
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            num_elements: mesh.data.indices.len() as u32,
        }
    }
}
