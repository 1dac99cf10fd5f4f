use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::engine::{GpuContext, InputState, Key, RenderPassDrawBatch};
use crate::tool::app_config::AppConfig;
use crate::tool::demo_scene::DemoScene;

/// Owns the event loop and renders the demo scene into a window.
pub struct WindowRunner {
    config: AppConfig,
    state: Option<WindowState>,
    input: InputState,
    last_frame_time: Instant,
    fatal_error: Option<anyhow::Error>,
}

struct WindowState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    gpu_context: GpuContext,
    depth_stencil_view: wgpu::TextureView,
    scene: DemoScene,
}

impl WindowRunner {
    pub fn run(config: AppConfig) -> Result<()> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut runner = WindowRunner {
            config,
            state: None,
            input: InputState::default(),
            last_frame_time: Instant::now(),
            fatal_error: None,
        };
        event_loop.run_app(&mut runner).context("Event loop terminated with error")?;

        match runner.fatal_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:?}");
        self.fatal_error = Some(err);
        event_loop.exit();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if let Some(key) = map_key(code) {
            self.input.set(key, event.state == ElementState::Pressed);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        let Some(state) = &mut self.state else {
            return;
        };
        state.scene.update(&self.input, delta_time);
        if let Err(err) = state.render(self.config.clear_color) {
            self.fail(event_loop, err);
        }
    }
}

impl ApplicationHandler for WindowRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match WindowState::new(event_loop, &self.config) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
                self.last_frame_time = Instant::now();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Exiting.");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                }
                self.handle_key(&event);
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl WindowState {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self> {
        let attributes = Window::default_attributes()
            .with_title(config.window_title.clone())
            .with_inner_size(PhysicalSize::new(config.window_size[0], config.window_size[1]));
        let window = Arc::new(event_loop.create_window(attributes).context("Failed to create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("Failed to create surface")?;
        let gpu_context = pollster::block_on(GpuContext::new_for_surface(
            &instance,
            &surface,
            config.cull_face.to_wgpu_face(),
        ))?;

        let adapter_info = gpu_context.adapter.get_info();
        info!("WGPU adapter: {:?} on {}", adapter_info.backend, adapter_info.name);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: gpu_context.framebuffer_info.color_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu_context.device, &surface_config);
        let depth_stencil_view = create_depth_stencil_view(&gpu_context, &surface_config);

        let scene = DemoScene::new(&gpu_context, config, aspect_ratio(size))?;

        Ok(Self {
            window,
            surface,
            surface_config,
            gpu_context,
            depth_stencil_view,
            scene,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        debug!("Resized to {}x{}", size.width, size.height);
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(&self.gpu_context.device, &self.surface_config);
        self.depth_stencil_view = create_depth_stencil_view(&self.gpu_context, &self.surface_config);
        self.scene.set_aspect_ratio(aspect_ratio(size));
    }

    fn render(&mut self, clear_color: [f64; 4]) -> Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.gpu_context.device, &self.surface_config);
                return Ok(());
            }
            Err(err) => {
                warn!("Skipping frame: {err}");
                return Ok(());
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut batch = RenderPassDrawBatch::default();
        self.scene.draw(&self.gpu_context, &mut batch)?;

        let mut encoder = self
            .gpu_context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let [r, g, b, a] = clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("screen"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_stencil_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            batch.render(&mut render_pass);
        }
        self.gpu_context.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

fn create_depth_stencil_view(
    context: &GpuContext,
    surface_config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_stencil"),
        size: wgpu::Extent3d {
            width: surface_config.width,
            height: surface_config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: context.framebuffer_info.depth_stencil_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn aspect_ratio(size: PhysicalSize<u32>) -> f32 {
    size.width.max(1) as f32 / size.height.max(1) as f32
}

fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::KeyQ => Some(Key::Q),
        KeyCode::KeyE => Some(Key::E),
        KeyCode::KeyZ => Some(Key::Z),
        KeyCode::KeyC => Some(Key::C),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steering_keys_are_mapped() {
        assert_eq!(map_key(KeyCode::ArrowUp), Some(Key::Up));
        assert_eq!(map_key(KeyCode::KeyC), Some(Key::C));
        assert_eq!(map_key(KeyCode::KeyW), None);
    }

    #[test]
    fn aspect_ratio_survives_minimized_window() {
        assert_eq!(aspect_ratio(PhysicalSize::new(1600, 800)), 2.0);
        assert_eq!(aspect_ratio(PhysicalSize::new(0, 0)), 1.0);
    }
}
