use std::f32::consts::{PI, TAU};

use anyhow::{ensure, Result};
use serde::Deserialize;
use strum::{Display, EnumString};

use super::{MeshIndex, Vertex};

/// Angular subdivision used for `Shape::Sphere`.
pub const SPHERE_FIDELITY: u32 = 12;

/// Vertex traversal direction of emitted triangles.
///
/// Defaults to clockwise, the faces that survive the default front-face culling.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum WindingOrder {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Shape {
    Cube,
    Pyramid,
    Sphere,
}

/// CPU-side triangle list, ready to be uploaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBuffer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<MeshIndex>,
}

fn vertex(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Vertex {
    Vertex {
        a_position: position,
        a_uv: uv,
        a_normal: normal,
    }
}

/// Maps a coordinate in [-1, 1] to texture space [0, 1].
fn to_tex_coord(position: f32) -> f32 {
    (position + 1.0) * 0.5
}

impl GeometryBuffer {
    pub fn shape(shape: Shape, winding_order: WindingOrder) -> Result<Self> {
        match shape {
            Shape::Cube => Ok(Self::cube(winding_order)),
            Shape::Pyramid => Ok(Self::pyramid()),
            Shape::Sphere => Self::sphere(SPHERE_FIDELITY, winding_order),
        }
    }

    /// Returns true if every index addresses a vertex and the indices form whole triangles.
    pub fn is_valid(&self) -> bool {
        let vertex_count = self.vertices.len() as MeshIndex;
        self.indices.len() % 3 == 0 && self.indices.iter().all(|&index| index < vertex_count)
    }

    /// Unit cube centered on the origin, four vertices per face so each face has its own normal.
    pub fn cube(winding_order: WindingOrder) -> Self {
        let vertices = vec![
            // Front
            vertex([-0.5, 0.5, 0.5], [0.0, 1.0], [0.0, 0.0, 1.0]),
            vertex([-0.5, -0.5, 0.5], [0.0, 0.0], [0.0, 0.0, 1.0]),
            vertex([0.5, -0.5, 0.5], [1.0, 0.0], [0.0, 0.0, 1.0]),
            vertex([0.5, 0.5, 0.5], [1.0, 1.0], [0.0, 0.0, 1.0]),
            // Back
            vertex([0.5, 0.5, -0.5], [0.0, 1.0], [0.0, 0.0, -1.0]),
            vertex([0.5, -0.5, -0.5], [0.0, 0.0], [0.0, 0.0, -1.0]),
            vertex([-0.5, -0.5, -0.5], [1.0, 0.0], [0.0, 0.0, -1.0]),
            vertex([-0.5, 0.5, -0.5], [1.0, 1.0], [0.0, 0.0, -1.0]),
            // Right
            vertex([0.5, 0.5, 0.5], [0.0, 1.0], [1.0, 0.0, 0.0]),
            vertex([0.5, -0.5, 0.5], [0.0, 0.0], [1.0, 0.0, 0.0]),
            vertex([0.5, -0.5, -0.5], [1.0, 0.0], [1.0, 0.0, 0.0]),
            vertex([0.5, 0.5, -0.5], [1.0, 1.0], [1.0, 0.0, 0.0]),
            // Left
            vertex([-0.5, 0.5, -0.5], [0.0, 1.0], [-1.0, 0.0, 0.0]),
            vertex([-0.5, -0.5, -0.5], [0.0, 0.0], [-1.0, 0.0, 0.0]),
            vertex([-0.5, -0.5, 0.5], [1.0, 0.0], [-1.0, 0.0, 0.0]),
            vertex([-0.5, 0.5, 0.5], [1.0, 1.0], [-1.0, 0.0, 0.0]),
            // Top
            vertex([-0.5, 0.5, -0.5], [0.0, 1.0], [0.0, 1.0, 0.0]),
            vertex([-0.5, 0.5, 0.5], [0.0, 0.0], [0.0, 1.0, 0.0]),
            vertex([0.5, 0.5, 0.5], [1.0, 0.0], [0.0, 1.0, 0.0]),
            vertex([0.5, 0.5, -0.5], [1.0, 1.0], [0.0, 1.0, 0.0]),
            // Bottom
            vertex([-0.5, -0.5, 0.5], [0.0, 1.0], [0.0, -1.0, 0.0]),
            vertex([-0.5, -0.5, -0.5], [0.0, 0.0], [0.0, -1.0, 0.0]),
            vertex([0.5, -0.5, -0.5], [1.0, 0.0], [0.0, -1.0, 0.0]),
            vertex([0.5, -0.5, 0.5], [1.0, 1.0], [0.0, -1.0, 0.0]),
        ];

        let mut indices = Vec::with_capacity(36);
        for face in 0..6 {
            let i = 4 * face;
            match winding_order {
                WindingOrder::CounterClockwise => {
                    indices.extend_from_slice(&[i, i + 1, i + 2, i, i + 2, i + 3]);
                }
                WindingOrder::Clockwise => {
                    indices.extend_from_slice(&[i, i + 2, i + 1, i, i + 3, i + 2]);
                }
            }
        }

        GeometryBuffer { vertices, indices }
    }

    /// Square-based pyramid. Side faces share the apex at index 12 and carry no normals.
    pub fn pyramid() -> Self {
        let vertices = vec![
            vertex([-0.5, 0.0, -0.5], [0.0, 1.0], [0.0; 3]),
            vertex([-0.5, 0.0, 0.5], [0.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, 0.5], [1.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, -0.5], [1.0, 1.0], [0.0; 3]),
            vertex([-0.5, 0.0, -0.5], [0.0, 0.0], [0.0; 3]),
            vertex([-0.5, 0.0, 0.5], [1.0, 0.0], [0.0; 3]),
            vertex([-0.5, 0.0, 0.5], [0.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, 0.5], [1.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, 0.5], [0.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, -0.5], [1.0, 0.0], [0.0; 3]),
            vertex([0.5, 0.0, -0.5], [0.0, 0.0], [0.0; 3]),
            vertex([-0.5, 0.0, -0.5], [1.0, 0.0], [0.0; 3]),
            // Apex
            vertex([0.0, 1.0, 0.0], [0.5, 1.0], [0.0; 3]),
        ];
        let indices = vec![
            1, 0, 3, 1, 3, 2, // base
            4, 5, 12, 6, 7, 12, 8, 9, 12, 10, 11, 12, // sides
        ];
        GeometryBuffer { vertices, indices }
    }

    /// Regular polygon in the XY plane, triangulated as a fan around a center vertex.
    ///
    /// Four sides produce a plain quad in a fixed vertex order regardless of `winding_order`.
    pub fn polygon(sides: u32, winding_order: WindingOrder) -> Self {
        if sides == 4 {
            return GeometryBuffer {
                vertices: vec![
                    vertex([-0.5, 0.5, 0.0], [0.0, 1.0], [0.0; 3]),
                    vertex([-0.5, -0.5, 0.0], [0.0, 0.0], [0.0; 3]),
                    vertex([0.5, -0.5, 0.0], [1.0, 0.0], [0.0; 3]),
                    vertex([0.5, 0.5, 0.0], [1.0, 1.0], [0.0; 3]),
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
            };
        }

        let mut vertices = Vec::with_capacity(sides as usize + 1);
        vertices.push(vertex([0.0, 0.0, 0.0], [0.5, 0.5], [0.0; 3]));

        let increment = TAU / sides as f32;
        let mut angle = 0.0f32;
        for _ in 0..sides {
            let (y, x) = angle.sin_cos();
            vertices.push(vertex([x, y, 0.0], [to_tex_coord(x), to_tex_coord(y)], [0.0; 3]));
            angle += increment;
        }

        let mut indices = Vec::with_capacity(3 * sides as usize);
        for i in 0..sides {
            let first = i + 1;
            // The last segment closes the fan on the first rim vertex
            let second = if i + 2 > sides { 1 } else { i + 2 };
            match winding_order {
                WindingOrder::CounterClockwise => indices.extend_from_slice(&[0, first, second]),
                WindingOrder::Clockwise => indices.extend_from_slice(&[0, second, first]),
            }
        }

        GeometryBuffer { vertices, indices }
    }

    /// UV sphere of radius 0.5 with `fidelity` rings of `fidelity` samples each.
    ///
    /// Both winding orders emit the same two triangles per cell, with reversed vertex order.
    pub fn sphere(fidelity: u32, winding_order: WindingOrder) -> Result<Self> {
        ensure!(fidelity >= 2, "Sphere fidelity must be at least 2, got {fidelity}");
        let f = fidelity;
        let steps = (f - 1) as f32;

        let mut vertices = Vec::with_capacity((f * f) as usize);
        let mut phi = 0.0f32;
        for i in 0..f {
            let mut theta = 0.0f32;
            for j in 0..f {
                let x = phi.cos() * theta.sin();
                let y = theta.cos();
                let z = phi.sin() * theta.sin();
                vertices.push(vertex(
                    [x * 0.5, y * 0.5, z * 0.5],
                    [1.0 - i as f32 / steps, 1.0 - j as f32 / steps],
                    [x, y, z],
                ));
                // Rings go pole to pole, half a circumference
                theta += PI / steps;
            }
            phi += TAU / steps;
        }

        let mut indices = Vec::with_capacity((6 * f * f) as usize);
        for i in 0..f {
            for j in 0..f {
                let current = i * f + j;
                let current_next = i * f + (j + 1) % f;
                let ring_next = ((i + 1) % f) * f + j;
                let diagonal = ((i + 1) % f) * f + (j + 1) % f;
                match winding_order {
                    WindingOrder::CounterClockwise => indices.extend_from_slice(&[
                        diagonal,
                        current,
                        ring_next,
                        current_next,
                        current,
                        diagonal,
                    ]),
                    WindingOrder::Clockwise => indices.extend_from_slice(&[
                        diagonal,
                        ring_next,
                        current,
                        current_next,
                        diagonal,
                        current,
                    ]),
                }
            }
        }

        Ok(GeometryBuffer { vertices, indices })
    }
}
