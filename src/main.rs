// Triangle renderer - windowing glue and entry point
//
// All Vulkan work lives in backend/ and renderer.rs; this file owns the
// winit event loop and the lifetime of the window and renderer. Fatal
// errors inside event callbacks are stashed and surfaced as the process
// exit status once the loop unwinds.

mod backend;
mod config;
mod error;
mod renderer;

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use backend::{shader, VulkanContext};
use config::Config;
use renderer::Renderer;

fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    log::info!("Starting triangle renderer");
    log::info!("Window: {}x{}", config.window.width, config.window.height);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    Ok(())
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    /// First unrecoverable error; ends the loop and becomes the exit status.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            fatal: None,
        }
    }

    fn init_renderer(&mut self, window: &Window) -> Result<()> {
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let ctx = VulkanContext::new(window, &self.config.window.title, enable_validation)?;

        let vert_code = shader::load_spirv(&self.config.shaders.vertex)
            .context("Failed to load vertex shader")?;
        let frag_code = shader::load_spirv(&self.config.shaders.fragment)
            .context("Failed to load fragment shader")?;

        let size = window.inner_size();
        let renderer = Renderer::new(
            ctx,
            size.width,
            size.height,
            &vert_code,
            &frag_code,
            self.config.graphics.clear_color,
        )?;

        self.renderer = Some(renderer);
        Ok(())
    }

    fn abort(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        log::error!("{:?}", e);
        if self.fatal.is_none() {
            self.fatal = Some(e);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.abort(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        if let Err(e) = self.init_renderer(&window) {
            self.abort(event_loop, e.context("Failed to initialize renderer"));
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                if let Some(ref renderer) = self.renderer {
                    let _ = renderer.wait_idle();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(ref mut renderer) = self.renderer {
                    renderer.mark_resized();
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else {
                    return;
                };
                let size = window.inner_size();
                if let Some(ref mut renderer) = self.renderer {
                    if let Err(e) = renderer.draw_frame(size.width, size.height) {
                        self.abort(event_loop, anyhow::Error::new(e).context("Render error"));
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting");
                    if let Some(ref renderer) = self.renderer {
                        let _ = renderer.wait_idle();
                    }
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws; the presentation engine paces us.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Renderer teardown needs an idle device; each backend object then
        // frees its own handles in declaration order.
        if let Some(ref renderer) = self.renderer {
            let _ = renderer.wait_idle();
        }
    }
}
