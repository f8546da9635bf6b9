//! Windowed host: a winit event loop driving the engine.
//!
//! The window's inner size is the container, and the engine draws straight
//! onto the window through [`GpuSurface`]. Each redraw hands the engine a
//! millisecond timestamp, then presents what it recorded.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::config::StarfieldConfig;
use crate::engine::{EngineState, Starfield};
use crate::error::RunError;
use crate::gpu::GpuSurface;
use crate::scheduler::{FrameRequest, SharedSize, SizeSource};

pub struct App {
    config: StarfieldConfig,
    window: Option<Arc<Window>>,
    /// Surface waiting for the container to get a usable size.
    pending: Option<GpuSurface>,
    engine: Starfield<GpuSurface, SharedSize>,
    container: SharedSize,
    clock: Instant,
    error: Option<RunError>,
}

impl App {
    pub fn new(config: StarfieldConfig) -> Self {
        Self {
            engine: Starfield::new(config.clone()),
            config,
            window: None,
            pending: None,
            container: SharedSize::empty(),
            clock: Instant::now(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: RunError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Attach and start once the window has a usable size.
    fn try_start(&mut self) {
        if self.engine.state() != EngineState::Uninitialized || self.pending.is_none() {
            return;
        }
        let sized = self
            .container
            .container_size()
            .is_some_and(|(w, h)| w > 0 && h > 0);
        if !sized {
            return;
        }
        if self.engine.attach(self.pending.take(), self.container.clone()) {
            self.engine.start();
        } else {
            log::warn!("starfield could not attach to the window");
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.try_start();

        let now = self.clock.elapsed().as_secs_f64() * 1000.0;
        if self.engine.state() == EngineState::Running && self.engine.on_frame(now) == FrameRequest::Stop {
            event_loop.exit();
            return;
        }

        if let Some(surface) = self.engine.surface_mut() {
            match surface.present() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => surface.reconfigure(),
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("GPU out of memory");
                    event_loop.exit();
                    return;
                }
                Err(e) => log::warn!("present failed: {:?}", e),
            }
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Starfield")
            .with_transparent(true)
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 318));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match pollster::block_on(GpuSurface::new(window.clone())) {
            Ok(surface) => self.pending = Some(surface),
            Err(e) => return self.fail(event_loop, e.into()),
        }

        let size = window.inner_size();
        self.container.set(size.width, size.height);
        log::info!(
            "window opened at {}x{}, seed {:?}",
            size.width,
            size.height,
            self.config.seed
        );

        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.engine.dispose();
                event_loop.exit();
            }
            // The engine picks the new size up on its next frame and
            // reconfigures the surface itself.
            WindowEvent::Resized(size) => self.container.set(size.width, size.height),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Open a window and animate a starfield in it until the window closes.
pub fn run(config: StarfieldConfig) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
