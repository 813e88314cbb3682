use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use kiln_engine::device::{Gpu, SurfaceErrorAction};
use kiln_engine::render::RenderTarget;

use crate::cli::ViewerConfig;
use crate::clock::{FrameClock, FrameTime};
use crate::scene::Scene;

/// Frames between flush statistics at debug level.
const STATS_INTERVAL: u64 = 600;

/// Opens the window and runs the render loop until it is closed.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer::new(config);

    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;

    match viewer.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct Viewer {
    config: ViewerConfig,
    entry: Option<WindowEntry>,
    scene: Option<Scene>,
    clock: FrameClock,
    failure: Option<anyhow::Error>,
}

impl Viewer {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            entry: None,
            scene: None,
            clock: FrameClock::default(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.config.size;
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(width as f64, height as f64));

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.config.gpu.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()?;

        let scene = entry.with_gpu(|gpu| Scene::new(&gpu.render_ctx(), &self.config))?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.scene = Some(scene);
        self.clock = FrameClock::default();
        Ok(())
    }

    /// Draws one frame. Returns `false` when the loop should stop.
    fn redraw(&mut self) -> bool {
        let time = self.clock.tick();
        let (Some(entry), Some(scene)) = (self.entry.as_mut(), self.scene.as_mut()) else {
            return true;
        };
        entry.with_gpu_mut(|gpu| draw_frame(gpu, scene, time))
    }
}

fn draw_frame(gpu: &mut Gpu<'_>, scene: &mut Scene, time: FrameTime) -> bool {
    let size = gpu.size();
    if size.width == 0 || size.height == 0 {
        return true;
    }

    // Acquire first so a lost surface does not leave recorded draws behind.
    let mut frame = match gpu.begin_frame() {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("surface error: {err}");
            return gpu.handle_surface_error(err) != SurfaceErrorAction::Fatal;
        }
    };

    let stats = scene.update(time.elapsed, size.width as f32 / size.height as f32);
    {
        let mut target = RenderTarget::new(
            &mut frame.encoder,
            &frame.view,
            gpu.depth_view(),
            (size.width, size.height),
        );
        scene.encode(&mut target);
    }
    gpu.submit(frame);

    if time.frame_index % STATS_INTERVAL == 0 {
        log::debug!(
            "frame {}: {} draws, {} vertices, {} indices ({:.1} ms)",
            time.frame_index,
            stats.draws,
            stats.vertices,
            stats.indices,
            time.dt * 1000.0
        );
    }
    true
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            self.fail(event_loop, err.context("viewer startup failed"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: the light and the body are animated.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                }
            }

            WindowEvent::RedrawRequested => {
                if !self.redraw() {
                    self.fail(event_loop, anyhow::anyhow!("surface is out of memory"));
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The scene holds GPU resources of the window's device; drop it first.
        self.scene = None;
        self.entry = None;
    }
}
