use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::input::InputState;
use crate::input::winit_keys::translate_window_event;
use crate::platform::{Platform, PlatformError, ResizeHandler};

use super::WindowConfig;

/// Upper bound on pumps while waiting for `resumed` to deliver the window.
const STARTUP_PUMPS: usize = 100;

/// Window-side state fed by winit callbacks.
struct WindowState {
    config: WindowConfig,
    window: Option<Arc<Window>>,
    startup_error: Option<anyhow::Error>,

    input: InputState,
    close_requested: bool,
    resize_handler: Option<ResizeHandler>,
}

impl WindowState {
    fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window: None,
            startup_error: None,
            input: InputState::default(),
            close_requested: false,
            resize_handler: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        Ok(Arc::new(window))
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match self.create_window(event_loop) {
            Ok(window) => {
                log::debug!("window created ({:?})", window.inner_size());
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("failed to create initial window: {e:#}");
                self.startup_error = Some(e);
                self.close_requested = true;
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => self.close_requested = true,

            WindowEvent::Resized(size) => {
                if let Some(handler) = self.resize_handler.as_mut() {
                    handler(size.width, size.height);
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let (Some(window), Some(handler)) = (&self.window, self.resize_handler.as_mut()) {
                    let size = window.inner_size();
                    handler(size.width, size.height);
                }
            }

            _ => {
                if let Some(ev) = translate_window_event(&event) {
                    self.input.apply_event(&ev);
                }
            }
        }
    }
}

/// `Platform` backed by a single winit window.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    state: WindowState,
    window: Arc<Window>,
}

impl WinitPlatform {
    /// Creates the event loop and pumps it until the window exists.
    pub fn new(config: WindowConfig) -> Result<Self, PlatformError> {
        let mut event_loop = EventLoop::new()
            .map_err(|e| PlatformError::Init(format!("failed to create winit EventLoop: {e}")))?;
        let mut state = WindowState::new(config);

        for _ in 0..STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state)
            {
                return Err(PlatformError::Init(format!(
                    "event loop exited during startup (code {code})"
                )));
            }
            if state.window.is_some() || state.startup_error.is_some() {
                break;
            }
        }

        if let Some(e) = state.startup_error.take() {
            return Err(PlatformError::Init(format!("{e:#}")));
        }
        let window = state
            .window
            .clone()
            .ok_or_else(|| PlatformError::Init("window was not created".to_string()))?;

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    /// Shared handle to the window, for surface creation.
    pub fn window(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }
}

impl Platform for WinitPlatform {
    fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn poll_input(&mut self) -> &InputState {
        &self.state.input
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn set_should_close(&mut self, close: bool) {
        self.state.close_requested = close;
    }

    fn set_resize_handler(&mut self, handler: ResizeHandler) {
        self.state.resize_handler = Some(handler);
    }

    fn pre_present(&self) {
        self.window.pre_present_notify();
    }

    fn pump_events(&mut self) {
        self.state.input.begin_frame();

        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::debug!("event loop exited (code {code})");
            self.state.close_requested = true;
        }
    }
}
