use wgpu::{CompareFunction, StencilOperation};

/// Fixed-function depth and stencil configuration a draw is recorded with.
///
/// Mutated in place through the frame like the classic global pipeline state. Every
/// distinct value (ignoring the reference) maps to one cached render pipeline per program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub stencil_compare: CompareFunction,
    /// Dynamic state, set on the render pass for each draw.
    pub stencil_reference: u32,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub stencil_fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub stencil_pass_op: StencilOperation,
    pub depth_test: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stencil_compare: CompareFunction::Always,
            stencil_reference: 1,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            stencil_fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            stencil_pass_op: StencilOperation::Keep,
            depth_test: true,
        }
    }
}

impl PipelineState {
    pub fn stencil_func(&mut self, compare: CompareFunction, reference: u32, read_mask: u32) {
        self.stencil_compare = compare;
        self.stencil_reference = reference;
        self.stencil_read_mask = read_mask;
    }

    pub fn stencil_op(
        &mut self,
        fail: StencilOperation,
        depth_fail: StencilOperation,
        pass: StencilOperation,
    ) {
        self.stencil_fail_op = fail;
        self.depth_fail_op = depth_fail;
        self.stencil_pass_op = pass;
    }

    pub fn stencil_mask(&mut self, write_mask: u32) {
        self.stencil_write_mask = write_mask;
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    /// The state with the dynamic part cleared, used to key pipeline caches.
    pub fn pipeline_key(&self) -> PipelineState {
        PipelineState {
            stencil_reference: 0,
            ..*self
        }
    }

    /// Depth test off also means no depth writes.
    pub fn to_depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        let face = wgpu::StencilFaceState {
            compare: self.stencil_compare,
            fail_op: self.stencil_fail_op,
            depth_fail_op: self.depth_fail_op,
            pass_op: self.stencil_pass_op,
        };
        let depth_compare =
            if self.depth_test { CompareFunction::Less } else { CompareFunction::Always };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_test,
            depth_compare,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: self.stencil_read_mask,
                write_mask: self.stencil_write_mask,
            },
            bias: wgpu::DepthBiasState::default(),
        }
    }
}
