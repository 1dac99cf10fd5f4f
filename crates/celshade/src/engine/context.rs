use std::rc::Rc;

use anyhow::{Context, Result};
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::mesh::GpuBuffers;
use super::{
    PipelineState, ShaderProgram, TextureHandle, TextureStore, UniformSink, UniformSources,
    UniformValue, MAX_TEXTURE_UNITS,
};

/// Formats and rasterizer settings every render pipeline is created for.
#[derive(Clone, Debug)]
pub struct FramebufferInfo {
    pub color_format: wgpu::TextureFormat,
    pub depth_stencil_format: wgpu::TextureFormat,
    pub cull_mode: Option<wgpu::Face>,
}

pub struct GpuContext {
    #[allow(dead_code)]
    pub adapter: wgpu::Adapter,
    pub queue: wgpu::Queue,
    pub device: wgpu::Device,
    pub framebuffer_info: FramebufferInfo,
}

impl GpuContext {
    pub async fn new_for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
        cull_mode: Option<wgpu::Face>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(surface),
                ..Default::default()
            })
            .await
            .context("No suitable adapter found")?;
        let (device, queue) =
            adapter.request_device(&wgpu::DeviceDescriptor::default(), None).await?;

        let capabilities = surface.get_capabilities(&adapter);
        let color_format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .context("Surface has no supported formats")?;

        Ok(GpuContext {
            adapter,
            queue,
            device,
            framebuffer_info: FramebufferInfo {
                color_format,
                depth_stencil_format: wgpu::TextureFormat::Depth24PlusStencil8,
                cull_mode,
            },
        })
    }
}

// A draw command that belong to a certain render pass
pub struct RenderPassDrawCommand {
    pub pipeline: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub bind_groups: SmallVec<[(u32, wgpu::BindGroup); 2]>,
    pub index_count: u32,
    pub stencil_reference: u32,
}

// All draws of a frame, replayed in recording order.
#[derive(Default)]
pub struct RenderPassDrawBatch {
    pub draw_commands: SmallVec<[RenderPassDrawCommand; 32]>,
}

impl RenderPassDrawBatch {
    pub fn render(&self, render_pass: &mut wgpu::RenderPass) {
        for draw_command in &self.draw_commands {
            render_pass.set_pipeline(&draw_command.pipeline);
            render_pass.set_stencil_reference(draw_command.stencil_reference);
            render_pass.set_vertex_buffer(0, draw_command.vertex_buffer.slice(..));
            for (index, bind_group) in &draw_command.bind_groups {
                render_pass.set_bind_group(*index, bind_group, &[]);
            }
            render_pass
                .set_index_buffer(draw_command.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..draw_command.index_count, 0, 0..1);
        }
    }
}

/// Texture bound to each texture unit. Draws sample from these.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureUnits([Option<TextureHandle>; MAX_TEXTURE_UNITS]);

impl TextureUnits {
    pub fn bind(&mut self, unit: usize, texture: Option<TextureHandle>) {
        match self.0.get_mut(unit) {
            Some(slot) => *slot = texture,
            None => warn!("Texture unit {unit} out of range, max is {}", MAX_TEXTURE_UNITS - 1),
        }
    }

    pub fn get(&self, unit: usize) -> Option<TextureHandle> {
        self.0.get(unit).copied().flatten()
    }

    pub fn clear(&mut self) {
        self.0 = Default::default();
    }
}

/// Per-frame state draws are recorded against.
///
/// Carries the mutable fixed-function state, the texture units and the currently bound
/// program. Objects change these in place the same way they would on a classic GL context.
pub struct RenderPassContext<'pass> {
    pub gpu_context: &'pass GpuContext,
    pub textures: &'pass TextureStore,
    pub pass_queue: &'pass mut RenderPassDrawBatch,
    pub pipeline_state: PipelineState,
    pub texture_units: TextureUnits,
    bound_program: Option<Rc<ShaderProgram>>,
}

impl<'pass> RenderPassContext<'pass> {
    pub fn new(
        gpu_context: &'pass GpuContext,
        textures: &'pass TextureStore,
        pass_queue: &'pass mut RenderPassDrawBatch,
    ) -> Self {
        Self {
            gpu_context,
            textures,
            pass_queue,
            pipeline_state: PipelineState::default(),
            texture_units: TextureUnits::default(),
            bound_program: None,
        }
    }

    pub(crate) fn set_bound_program(&mut self, program: Option<Rc<ShaderProgram>>) {
        self.bound_program = program;
    }
}

/// What objects and meshes record their draws into.
///
/// State is changed in place and every draw picks up whatever program, pipeline state and
/// texture units are current at that moment.
pub trait DrawTarget: UniformSink {
    type Program;
    type Buffers;

    fn pipeline_state(&mut self) -> &mut PipelineState;

    /// Makes `program` current, then lets it push its per-draw uniforms.
    fn bind_program(&mut self, program: &Self::Program, sources: &UniformSources);

    fn unbind_program(&mut self);

    fn draw_indexed(&mut self, buffers: &Self::Buffers, index_count: u32) -> Result<()>;

    fn unbind_textures(&mut self);
}

impl DrawTarget for RenderPassContext<'_> {
    type Program = Rc<ShaderProgram>;
    type Buffers = GpuBuffers;

    fn pipeline_state(&mut self) -> &mut PipelineState {
        &mut self.pipeline_state
    }

    fn bind_program(&mut self, program: &Rc<ShaderProgram>, sources: &UniformSources) {
        program.bind(self, sources);
    }

    fn unbind_program(&mut self) {
        self.bound_program = None;
    }

    fn draw_indexed(&mut self, buffers: &GpuBuffers, index_count: u32) -> Result<()> {
        let program = self.bound_program.clone().context("No shader program bound")?;
        program.record_draw(self, buffers, index_count)
    }

    fn unbind_textures(&mut self) {
        self.texture_units.clear();
    }
}

impl UniformSink for RenderPassContext<'_> {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match &self.bound_program {
            Some(program) => program.set_uniform(name, value),
            None => trace!("Uniform '{name}' set with no program bound"),
        }
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>) {
        self.texture_units.bind(unit, texture);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum DrawEvent {
        BindProgram(&'static str),
        UnbindProgram {
            state: PipelineState,
        },
        Draw {
            program: Option<&'static str>,
            buffers: &'static str,
            index_count: u32,
            state: PipelineState,
        },
        SetUniform(String, UniformValue),
        BindTexture(usize, Option<TextureHandle>),
        UnbindTextures,
    }

    /// Logs every call in order, with the state a draw or unbind saw.
    #[derive(Default)]
    pub(crate) struct RecordingTarget {
        pub state: PipelineState,
        pub bound: Option<&'static str>,
        pub events: Vec<DrawEvent>,
    }

    impl UniformSink for RecordingTarget {
        fn set_uniform(&mut self, name: &str, value: UniformValue) {
            self.events.push(DrawEvent::SetUniform(name.to_string(), value));
        }

        fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>) {
            self.events.push(DrawEvent::BindTexture(unit, texture));
        }
    }

    impl DrawTarget for RecordingTarget {
        type Program = &'static str;
        type Buffers = &'static str;

        fn pipeline_state(&mut self) -> &mut PipelineState {
            &mut self.state
        }

        fn bind_program(&mut self, program: &&'static str, _sources: &UniformSources) {
            self.bound = Some(*program);
            self.events.push(DrawEvent::BindProgram(*program));
        }

        fn unbind_program(&mut self) {
            self.bound = None;
            self.events.push(DrawEvent::UnbindProgram { state: self.state });
        }

        fn draw_indexed(&mut self, buffers: &&'static str, index_count: u32) -> Result<()> {
            self.events.push(DrawEvent::Draw {
                program: self.bound,
                buffers: *buffers,
                index_count,
                state: self.state,
            });
            Ok(())
        }

        fn unbind_textures(&mut self) {
            self.events.push(DrawEvent::UnbindTextures);
        }
    }

    #[test]
    fn texture_units_bind_and_clear() {
        let mut units = TextureUnits::default();
        units.bind(0, Some(TextureHandle::for_test(3)));
        units.bind(15, Some(TextureHandle::for_test(4)));
        assert_eq!(units.get(0), Some(TextureHandle::for_test(3)));
        assert_eq!(units.get(15), Some(TextureHandle::for_test(4)));
        assert_eq!(units.get(1), None);

        units.clear();
        assert_eq!(units, TextureUnits::default());
    }

    #[test]
    fn out_of_range_unit_is_ignored() {
        let mut units = TextureUnits::default();
        units.bind(MAX_TEXTURE_UNITS, Some(TextureHandle::for_test(1)));
        assert_eq!(units, TextureUnits::default());
        assert_eq!(units.get(MAX_TEXTURE_UNITS), None);
    }
}
