//! Application event loop.
//!
//! Opens a window, builds a wgpu [`Context`] on it and drives a
//! [`Device`] with one `draw` per redraw request:
//!
//! 1. `resumed` creates the window, the context and the device, then runs
//!    `Device::startup` which loads the configured scene
//! 2. `Resized` forwards the new size to the device
//! 3. `RedrawRequested` measures the frame time and calls `Device::draw`
//!
//! A failure during startup ends the event loop and is returned from [`run`].

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{config::Config, context::Context, device::Device, error::Error};

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: Config,
    device: Option<Device<Context>>,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            config,
            device: None,
            last_time: Instant::now(),
            error: None,
        })
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Device<Context>> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let context = self.async_runtime.block_on(Context::new(window.clone()))?;
        let mut device = Device::new(context, self.config.clone());
        device.startup(self.config.fov)?;
        window.request_redraw();
        Ok(device)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.device.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(device) => {
                self.last_time = Instant::now();
                self.device = Some(device);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let device = match &mut self.device {
            Some(device) => device,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => device.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match device.draw(dt.as_secs_f64()) {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(Error::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                        let size = device.backend().window().inner_size();
                        device.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Runs the viewer until its window is closed.
pub fn run(config: Config) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
