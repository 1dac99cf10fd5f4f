use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::mem::size_of;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use smallvec::SmallVec;
use tracing::{debug, info, instrument, trace, warn};
use wgpu::util::DeviceExt;

use super::context::RenderPassDrawCommand;
use super::mesh::GpuBuffers;
use super::uniforms::{UniformBlock, UniformBlockLayout};
use super::{
    GpuContext, PipelineState, RenderPassContext, ShadingTechnique, UniformSources, UniformValue,
    Vertex, VERTEX_FORMAT,
};
use crate::loader::shader_compiler::{NamedResourceBinding, ShaderArtifact};
use crate::loader::ResourcePath;

#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    /// Returns the bind group index for this shader stage.
    ///
    /// Every resource of a vertex shader must use `@group(0)`, every resource of a fragment
    /// shader `@group(1)`. The uniform block of a stage is always at `@binding(0)`.
    pub fn get_descriptor_set_index(&self) -> u32 {
        match self {
            ShaderKind::Vertex => 0,
            ShaderKind::Fragment => 1,
        }
    }

    pub fn entry_point(&self) -> &'static str {
        match self {
            ShaderKind::Vertex => "vs_main",
            ShaderKind::Fragment => "fs_main",
        }
    }

    fn visibility(&self) -> wgpu::ShaderStages {
        match self {
            ShaderKind::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderKind::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

/// One stage of a program: which kind, which file holds the source, and the compiled
/// module once the program is built.
#[derive(Clone, Debug)]
pub struct ShaderInfo {
    pub kind: ShaderKind,
    pub path: ResourcePath,
    pub module: Option<wgpu::ShaderModule>,
}

impl ShaderInfo {
    pub fn new(kind: ShaderKind, path: ResourcePath) -> Self {
        Self {
            kind,
            path,
            module: None,
        }
    }
}

/// Bind group layout and the CPU copy of the uniform block of a compiled stage.
struct ShaderStage {
    kind: ShaderKind,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_layout: Option<UniformBlockLayout>,
    uniforms: RefCell<Option<UniformBlock>>,
    textures: Vec<NamedResourceBinding>,
    samplers: Vec<NamedResourceBinding>,
}

impl ShaderStage {
    fn new(context: &GpuContext, artifact: ShaderArtifact) -> (Self, wgpu::ShaderModule) {
        let visibility = artifact.kind.visibility();
        let mut entries = vec![];

        if let Some(layout) = &artifact.uniform_block {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: layout.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for texture in &artifact.textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture.binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        for sampler in &artifact.samplers {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout =
            context.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        let module = context.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: None,
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(artifact.source.as_str())),
        });

        let stage = ShaderStage {
            kind: artifact.kind,
            bind_group_layout,
            uniforms: RefCell::new(artifact.uniform_block.as_ref().map(UniformBlock::new)),
            uniform_layout: artifact.uniform_block,
            textures: artifact.textures,
            samplers: artifact.samplers,
        };
        (stage, module)
    }

    fn make_bind_group(
        &self,
        context: &RenderPassContext,
        sampler: &wgpu::Sampler,
        sampler_units: &HashMap<String, usize>,
    ) -> wgpu::BindGroup {
        let device = &context.gpu_context.device;

        // Snapshot of the current values, so later writes don't affect this draw
        let uniform_buffer = self.uniforms.borrow().as_ref().map(|block| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: block.as_bytes(),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });
        let mut entries = SmallVec::<[_; 8]>::new();
        if let (Some(buffer), Some(layout)) = (&uniform_buffer, &self.uniform_layout) {
            entries.push(wgpu::BindGroupEntry {
                binding: layout.binding,
                resource: buffer.as_entire_binding(),
            });
        }

        for texture in &self.textures {
            let unit = sampler_units.get(&texture.name).copied().unwrap_or(0);
            let view = context.textures.view(context.texture_units.get(unit));
            entries.push(wgpu::BindGroupEntry {
                binding: texture.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        for binding in &self.samplers {
            entries.push(wgpu::BindGroupEntry {
                binding: binding.binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }
}

/// A linked vertex + fragment program with name-addressed uniforms.
///
/// Render pipelines are created lazily for each distinct `PipelineState` the program is
/// drawn with.
pub struct ShaderProgram {
    pub id: String,
    /// The stages in the order the program was built from, each with its compiled module.
    shaders: Vec<ShaderInfo>,
    vertex: ShaderStage,
    fragment: ShaderStage,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    technique: Option<ShadingTechnique>,

    /// Texture unit each texture binding samples from, when not unit 0.
    sampler_units: RefCell<HashMap<String, usize>>,
    pipelines: RefCell<HashMap<PipelineState, wgpu::RenderPipeline>>,
}

impl ShaderProgram {
    /// Compiles the stages from their source files and links them.
    #[instrument(skip(context, shaders, technique))]
    pub fn try_new(
        context: &GpuContext,
        id: &str,
        shaders: &[ShaderInfo],
        technique: Option<ShadingTechnique>,
    ) -> Result<Rc<ShaderProgram>> {
        check_stage_list(id, shaders)?;

        let mut vertex = None;
        let mut fragment = None;
        for info in shaders {
            let path = info.path.full_path();
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read shader '{}'", info.path))?;
            let artifact = ShaderArtifact::from_wgsl(info.kind, &source, &info.path.to_string())?;
            match info.kind {
                ShaderKind::Vertex => vertex = Some(artifact),
                ShaderKind::Fragment => fragment = Some(artifact),
            }
        }
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            bail!("Program '{id}' needs a vertex and a fragment shader");
        };

        Self::link(context, id, shaders.to_vec(), vertex, fragment, technique).map(Rc::new)
    }

    fn link(
        context: &GpuContext,
        id: &str,
        mut shaders: Vec<ShaderInfo>,
        vertex: ShaderArtifact,
        fragment: ShaderArtifact,
        technique: Option<ShadingTechnique>,
    ) -> Result<ShaderProgram> {
        let device = &context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let (vertex, vertex_module) = ShaderStage::new(context, vertex);
        let (fragment, fragment_module) = ShaderStage::new(context, fragment);
        for info in &mut shaders {
            info.module = Some(match info.kind {
                ShaderKind::Vertex => vertex_module.clone(),
                ShaderKind::Fragment => fragment_module.clone(),
            });
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(id),
            bind_group_layouts: &[&vertex.bind_group_layout, &fragment.bind_group_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let program = ShaderProgram {
            id: id.to_string(),
            shaders,
            vertex,
            fragment,
            pipeline_layout,
            sampler,
            technique,
            sampler_units: RefCell::new(HashMap::new()),
            pipelines: RefCell::new(HashMap::new()),
        };
        // Linking is validating the stages against each other in a full pipeline
        let pipeline = program.pipeline(context, &PipelineState::default());

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            bail!("Failed to link program '{id}': {error}");
        }
        pipeline?;
        info!("Linked program '{id}'.");
        Ok(program)
    }

    /// Makes this the program subsequent uniforms and draws go to, then lets its
    /// technique push the per-draw uniforms.
    pub fn bind(self: &Rc<Self>, context: &mut RenderPassContext, sources: &UniformSources) {
        context.set_bound_program(Some(Rc::clone(self)));
        if let Some(technique) = self.technique {
            technique.push_uniforms(context, sources);
        }
    }

    /// Sets a uniform by name in every stage that declares it.
    ///
    /// An `Int` assigned to a texture binding's name selects the texture unit it samples.
    pub fn set_uniform(&self, name: &str, value: UniformValue) {
        let mut found = false;
        for stage in [&self.vertex, &self.fragment] {
            let Some(slot) = stage.uniform_layout.as_ref().and_then(|l| l.slots.get(name)) else {
                continue;
            };
            if let Some(block) = stage.uniforms.borrow_mut().as_mut() {
                block.write(name, slot, &value);
            }
            found = true;
        }

        let is_texture = [&self.vertex, &self.fragment]
            .iter()
            .any(|stage| stage.textures.iter().any(|texture| texture.name == name));
        if is_texture {
            match value {
                UniformValue::Int(unit) if unit >= 0 => {
                    self.sampler_units.borrow_mut().insert(name.to_string(), unit as usize);
                }
                _ => warn!("Texture '{name}' can only be assigned a texture unit, got {value:?}"),
            }
            found = true;
        }

        if !found {
            trace!("Program '{}' has no uniform '{name}'", self.id);
        }
    }

    /// Records a draw of `buffers` with the context's current pipeline state and texture units.
    pub fn record_draw(
        &self,
        context: &mut RenderPassContext,
        buffers: &GpuBuffers,
        index_count: u32,
    ) -> Result<()> {
        let pipeline = self.pipeline(context.gpu_context, &context.pipeline_state)?;
        let sampler_units = self.sampler_units.borrow();
        let mut bind_groups = SmallVec::new();
        for stage in [&self.vertex, &self.fragment] {
            let bind_group = stage.make_bind_group(context, &self.sampler, &sampler_units);
            bind_groups.push((stage.kind.get_descriptor_set_index(), bind_group));
        }
        context.pass_queue.draw_commands.push(RenderPassDrawCommand {
            pipeline,
            vertex_buffer: buffers.vertex_buffer.clone(),
            index_buffer: buffers.index_buffer.clone(),
            bind_groups,
            index_count,
            stencil_reference: context.pipeline_state.stencil_reference,
        });
        Ok(())
    }

    fn stage_module(&self, kind: ShaderKind) -> Result<&wgpu::ShaderModule> {
        self.shaders
            .iter()
            .find(|info| info.kind == kind)
            .and_then(|info| info.module.as_ref())
            .with_context(|| format!("Program '{}' has no compiled {kind:?} stage", self.id))
    }

    fn pipeline(&self, context: &GpuContext, state: &PipelineState) -> Result<wgpu::RenderPipeline> {
        let key = state.pipeline_key();
        if let Some(pipeline) = self.pipelines.borrow().get(&key) {
            return Ok(pipeline.clone());
        }
        debug!(
            "Creating pipeline for program '{}' ({}): {key:?}",
            self.id,
            self.shaders.iter().map(|info| &info.path).join(", ")
        );

        let framebuffer_info = &context.framebuffer_info;
        let vertex_buffer_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_FORMAT,
        };
        let pipeline = context.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&self.id),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: self.stage_module(ShaderKind::Vertex)?,
                entry_point: Some(ShaderKind::Vertex.entry_point()),
                buffers: &[vertex_buffer_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.stage_module(ShaderKind::Fragment)?,
                entry_point: Some(ShaderKind::Fragment.entry_point()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: framebuffer_info.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: framebuffer_info.cull_mode,
                ..Default::default()
            },
            depth_stencil: Some(key.to_depth_stencil_state(framebuffer_info.depth_stencil_format)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        self.pipelines.borrow_mut().insert(key, pipeline.clone());
        Ok(pipeline)
    }
}

/// A program is built from exactly one vertex and one fragment stage.
fn check_stage_list(id: &str, shaders: &[ShaderInfo]) -> Result<()> {
    for kind in [ShaderKind::Vertex, ShaderKind::Fragment] {
        match shaders.iter().filter(|info| info.kind == kind).count() {
            1 => {}
            0 => bail!("Program '{id}' has no {kind:?} shader"),
            _ => bail!("Program '{id}' has more than one {kind:?} shader"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;

    fn info(kind: ShaderKind, file_name: &str) -> ShaderInfo {
        let root = Arc::new(PathBuf::from("app"));
        ShaderInfo::new(kind, ResourcePath::new(&root, "shaders", file_name))
    }

    #[test]
    fn stage_list_needs_one_of_each_kind() {
        let vertex = info(ShaderKind::Vertex, "a.vert.wgsl");
        let fragment = info(ShaderKind::Fragment, "a.frag.wgsl");
        assert!(check_stage_list("ok", &[fragment.clone(), vertex.clone()]).is_ok());

        let missing = check_stage_list("missing", &[vertex.clone()]).unwrap_err();
        assert!(format!("{missing}").contains("no Fragment shader"), "{missing}");

        let duplicate = check_stage_list("dup", &[vertex.clone(), vertex, fragment]).unwrap_err();
        assert!(format!("{duplicate}").contains("more than one Vertex"), "{duplicate}");
    }

    #[test]
    fn stage_starts_uncompiled() {
        let info = info(ShaderKind::Vertex, "a.vert.wgsl");
        assert!(info.module.is_none());
        assert_eq!(info.kind.entry_point(), "vs_main");
        assert_eq!(info.kind.get_descriptor_set_index(), 0);
        assert_eq!(ShaderKind::Fragment.get_descriptor_set_index(), 1);
    }
}
