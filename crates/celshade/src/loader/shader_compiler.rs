use std::collections::HashMap;

use anyhow::{anyhow, bail, ensure, Context, Result};
use naga::{AddressSpace, ArraySize, ScalarKind, TypeInner, VectorSize};
use tracing::{debug, instrument, trace};

use crate::engine::shader::ShaderKind;
use crate::engine::uniforms::{UniformBlockLayout, UniformSlot, UniformType};

/// A descriptor binding point for a named resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedResourceBinding {
    pub name: String,
    pub binding: u32,
}

/// The validated shader source and its reflected interface.
#[derive(Debug)]
pub struct ShaderArtifact {
    pub kind: ShaderKind,
    pub source: String,
    /// Layout of the block at binding 0, if the stage declares one.
    pub uniform_block: Option<UniformBlockLayout>,
    pub textures: Vec<NamedResourceBinding>,
    pub samplers: Vec<NamedResourceBinding>,
}

impl ShaderArtifact {
    /// Parses and validates WGSL source, then reflects its resources.
    ///
    /// Every resource must live in the bind group of the stage, see
    /// `ShaderKind::get_descriptor_set_index`.
    #[instrument(skip(source))]
    pub fn from_wgsl(kind: ShaderKind, source: &str, path: &str) -> Result<Self> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|err| anyhow!("Failed to parse '{path}':\n{}", err.emit_to_string(source)))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| anyhow!("Failed to validate '{path}':\n{}", err.emit_to_string(source)))?;

        let stage = match kind {
            ShaderKind::Vertex => naga::ShaderStage::Vertex,
            ShaderKind::Fragment => naga::ShaderStage::Fragment,
        };
        module
            .entry_points
            .iter()
            .find(|ep| ep.name == kind.entry_point() && ep.stage == stage)
            .with_context(|| format!("Failed to find entry point '{}'", kind.entry_point()))?;

        let descriptor_set_index = kind.get_descriptor_set_index();
        let mut uniform_block = None;
        let mut textures = Vec::new();
        let mut samplers = Vec::new();

        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let name = var.name.clone().with_context(|| {
                format!("Failed to get name for resource at binding={}", binding.binding)
            })?;
            ensure!(
                binding.group == descriptor_set_index,
                "Descriptor set index mismatch for '{name}', expected {}, got {}",
                descriptor_set_index,
                binding.group
            );
            match (&var.space, &module.types[var.ty].inner) {
                (AddressSpace::Uniform, TypeInner::Struct { span, .. }) => {
                    ensure!(
                        binding.binding == 0,
                        "Uniform block '{name}' must use binding 0, got {}",
                        binding.binding
                    );
                    let mut slots = HashMap::new();
                    flatten_members(&module, var.ty, "", 0, &mut slots)?;
                    uniform_block = Some(UniformBlockLayout {
                        binding: binding.binding,
                        size: *span as usize,
                        slots,
                    });
                }
                (AddressSpace::Handle, TypeInner::Image { .. }) => {
                    textures.push(NamedResourceBinding {
                        name,
                        binding: binding.binding,
                    });
                }
                (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => {
                    samplers.push(NamedResourceBinding {
                        name,
                        binding: binding.binding,
                    });
                }
                (space, ty) => bail!("Unsupported resource '{name}': {space:?} {ty:?}"),
            }
        }

        debug!(
            "Found {} uniforms, {} textures and {} samplers.",
            uniform_block.as_ref().map_or(0, |block| block.slots.len()),
            textures.len(),
            samplers.len()
        );
        if let Some(block) = &uniform_block {
            trace!("Uniforms: {:?}", block.slots.keys().collect::<Vec<_>>());
        }

        Ok(ShaderArtifact {
            kind,
            source: source.to_string(),
            uniform_block,
            textures,
            samplers,
        })
    }
}

/// Adds every leaf member of `ty` to `slots`, named by its access path.
fn flatten_members(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    prefix: &str,
    offset: usize,
    slots: &mut HashMap<String, UniformSlot>,
) -> Result<()> {
    match &module.types[ty].inner {
        TypeInner::Struct { members, .. } => {
            for member in members {
                let name = member.name.as_deref().context("Unnamed uniform member")?;
                let path = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}.{name}")
                };
                flatten_members(module, member.ty, &path, offset + member.offset as usize, slots)?;
            }
        }
        TypeInner::Array {
            base,
            size: ArraySize::Constant(count),
            stride,
        } => {
            for i in 0..count.get() as usize {
                let path = format!("{prefix}[{i}]");
                flatten_members(module, *base, &path, offset + i * *stride as usize, slots)?;
            }
        }
        inner => {
            let ty = uniform_type(inner)
                .with_context(|| format!("Unsupported type of uniform '{prefix}': {inner:?}"))?;
            slots.insert(prefix.to_string(), UniformSlot { offset, ty });
        }
    }
    Ok(())
}

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    match inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Sint => Some(UniformType::Int),
            ScalarKind::Uint => Some(UniformType::Uint),
            ScalarKind::Float => Some(UniformType::Float),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => Some(UniformType::Vec2),
            VectorSize::Tri => Some(UniformType::Vec3),
            VectorSize::Quad => Some(UniformType::Vec4),
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformType::Mat4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT_SOURCE: &str = r#"
struct PointLight {
    Position: vec3<f32>,
    Color: vec3<f32>,
    SpecularStrength: f32,
    AttenuationLinear: f32,
    AttenuationExponent: f32,
}

struct Uniforms {
    TextureCount: i32,
    AmbientStrength: f32,
    Shininess: f32,
    PointLightCount: i32,
    AmbientColor: vec3<f32>,
    CameraPos: vec3<f32>,
    PointLights: array<PointLight, 4>,
}

@group(1) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(1) var ImageTexture0: texture_2d<f32>;
@group(1) @binding(2) var ImageSampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let light = u.PointLights[0];
    let color = textureSample(ImageTexture0, ImageSampler, uv).rgb * u.AmbientColor;
    return vec4<f32>(color * light.Color * f32(u.PointLightCount), 1.0);
}
"#;

    const VERTEX_SOURCE: &str = r#"
struct Uniforms {
    PVMMatrix: mat4x4<f32>,
    ModelMatrix: mat4x4<f32>,
    OutlineWidth: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.PVMMatrix * vec4<f32>(position * u.OutlineWidth, 1.0);
}
"#;

    fn slot(artifact: &ShaderArtifact, name: &str) -> UniformSlot {
        artifact.uniform_block.as_ref().unwrap().slots[name]
    }

    #[test]
    fn reflects_nested_uniform_names_and_offsets() {
        let artifact =
            ShaderArtifact::from_wgsl(ShaderKind::Fragment, FRAGMENT_SOURCE, "test.wgsl").unwrap();
        let block = artifact.uniform_block.as_ref().unwrap();

        assert_eq!(slot(&artifact, "TextureCount").ty, UniformType::Int);
        assert_eq!(slot(&artifact, "CameraPos").offset, 32);
        assert_eq!(slot(&artifact, "PointLights[0].Position").offset, 48);
        assert_eq!(
            slot(&artifact, "PointLights[1].Color"),
            UniformSlot {
                offset: 112,
                ty: UniformType::Vec3
            }
        );
        assert_eq!(slot(&artifact, "PointLights[3].AttenuationExponent").offset, 228);
        assert_eq!(block.size, 240);
        assert_eq!(block.slots.len(), 6 + 4 * 5);
    }

    #[test]
    fn reflects_textures_and_samplers() {
        let artifact =
            ShaderArtifact::from_wgsl(ShaderKind::Fragment, FRAGMENT_SOURCE, "test.wgsl").unwrap();
        assert_eq!(
            artifact.textures,
            vec![NamedResourceBinding {
                name: "ImageTexture0".to_string(),
                binding: 1
            }]
        );
        assert_eq!(artifact.samplers[0].name, "ImageSampler");
    }

    #[test]
    fn reflects_matrices() {
        let artifact =
            ShaderArtifact::from_wgsl(ShaderKind::Vertex, VERTEX_SOURCE, "test.wgsl").unwrap();
        assert_eq!(slot(&artifact, "ModelMatrix").offset, 64);
        assert_eq!(slot(&artifact, "ModelMatrix").ty, UniformType::Mat4);
        assert_eq!(slot(&artifact, "OutlineWidth").offset, 128);
    }

    #[test]
    fn rejects_wrong_stage() {
        // Resources are in group 0, but a fragment stage has no such entry point either
        let result = ShaderArtifact::from_wgsl(ShaderKind::Fragment, VERTEX_SOURCE, "test.wgsl");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_wrong_bind_group() {
        let source = FRAGMENT_SOURCE.replace("@group(1)", "@group(0)");
        let result = ShaderArtifact::from_wgsl(ShaderKind::Fragment, &source, "test.wgsl");
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Descriptor set index mismatch"), "{message}");
    }

    #[test]
    fn reports_syntax_errors() {
        let result = ShaderArtifact::from_wgsl(ShaderKind::Vertex, "fn vs_main( {", "broken.wgsl");
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("broken.wgsl"), "{message}");
    }

    #[test]
    fn bundled_shaders_reflect() {
        let shaders = [
            (ShaderKind::Vertex, include_str!("../../../../app/shaders/cel_shading.vert.wgsl")),
            (ShaderKind::Fragment, include_str!("../../../../app/shaders/cel_shading.frag.wgsl")),
            (ShaderKind::Vertex, include_str!("../../../../app/shaders/toon_outline.vert.wgsl")),
            (ShaderKind::Fragment, include_str!("../../../../app/shaders/toon_outline.frag.wgsl")),
        ];
        for (kind, source) in shaders {
            let artifact = ShaderArtifact::from_wgsl(kind, source, "bundled.wgsl").unwrap();
            assert!(artifact.uniform_block.is_some());
        }

        let outline = ShaderArtifact::from_wgsl(shaders[3].0, shaders[3].1, "bundled.wgsl").unwrap();
        assert_eq!(slot(&outline, "Color").ty, UniformType::Vec3);
    }
}
