// SPDX-License-Identifier: GPL-3.0-only

//! Preview window
//!
//! Rendering is dirty-redraw: nothing is drawn on a clock. Each published
//! frame sends a [`PreviewEvent::FrameReady`] through the event loop proxy;
//! the handler asks the window for a redraw, and `RedrawRequested` drains the
//! frame channel and draws. Resizes and expose events redraw the last frame.
//!
//! Keys: `C` switches between front and back camera, `Esc` quits.
//!
//! If the conversion pipeline cannot be built the window stays open, capture
//! is released and the surface is left as it is.

pub mod headless;

use crate::backends::camera::{
    CameraFacing, CaptureLoopController, RetryPolicy, SourceSpec, open_source, open_with_retry,
    start_preview_capture,
};
use crate::constants::{app_info, preview};
use crate::diagnostics::{CpuReadings, CpuSampler, FrameStats};
use crate::errors::{AppError, AppResult, PipelineError, PipelineResult};
use crate::gpu::{self, GpuContext};
use crate::render::{FrameChannel, PipelineState, RenderContext, RenderTrigger};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

/// Events delivered to the window from other threads
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    /// A frame was published
    FrameReady,
    /// The camera could not be opened
    CaptureFailed(String),
}

/// Render trigger that wakes the winit event loop
pub struct ProxyTrigger(Mutex<EventLoopProxy<PreviewEvent>>);

impl ProxyTrigger {
    pub fn new(proxy: EventLoopProxy<PreviewEvent>) -> Self {
        Self(Mutex::new(proxy))
    }
}

impl RenderTrigger for ProxyTrigger {
    fn request_render(&self) {
        let proxy = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        // Fails only once the event loop has exited
        let _ = proxy.send_event(PreviewEvent::FrameReady);
    }
}

/// Settings for one preview run
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub source: SourceSpec,
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
    pub retry: RetryPolicy,
    pub fps_window: usize,
    pub cpu_sample_interval: Duration,
    pub cpu_average_window: usize,
}

/// GPU state bound to the window surface
struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    gpu: GpuContext,
    context: RenderContext,
}

impl SurfaceState {
    fn create(window: Arc<Window>, facing: CameraFacing) -> AppResult<Self> {
        let instance = gpu::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| AppError::Gpu(format!("Failed to create surface: {}", e)))?;
        let gpu = pollster::block_on(gpu::create_device(&instance, Some(&surface), "camera-preview window"))
            .map_err(AppError::Gpu)?;

        let caps = surface.get_capabilities(&gpu.adapter);
        // Linear output, like the offscreen target
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| AppError::Gpu("Surface reports no formats".to_string()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);
        info!(format = ?format, width = config.width, height = config.height, "Surface configured");

        let mut context = RenderContext::new(format, facing, (config.width, config.height));
        if let Err(e) = context.initialize(&gpu.device) {
            // Window stays up; the context reports Failed from here on
            error!(error = %e, "Preview pipeline unusable, no frames will be shown");
        }

        Ok(Self {
            surface,
            config,
            gpu,
            context,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.gpu.device, &self.config);
        self.context.set_viewport(self.config.width, self.config.height);
    }

    /// Fresh context for a capture session with other dimensions
    fn rebuild_context(&mut self) -> PipelineResult<()> {
        self.context = self.context.rebuild(&self.gpu.device)?;
        Ok(())
    }

    fn is_failed(&self) -> bool {
        self.context.pipeline_state() == PipelineState::Failed
    }
}

pub struct PreviewApp {
    options: PreviewOptions,
    proxy: EventLoopProxy<PreviewEvent>,
    channel: Arc<FrameChannel<ProxyTrigger>>,
    cpu: CpuReadings,
    facing: CameraFacing,
    window: Option<Arc<Window>>,
    surface: Option<SurfaceState>,
    capture: Option<CaptureLoopController>,
    exit_error: Option<AppError>,
}

impl PreviewApp {
    pub fn new(options: PreviewOptions, proxy: EventLoopProxy<PreviewEvent>, cpu: CpuReadings) -> Self {
        let channel = Arc::new(FrameChannel::with_trigger(ProxyTrigger::new(proxy.clone())));
        let facing = options.facing;
        Self {
            options,
            proxy,
            channel,
            cpu,
            facing,
            window: None,
            surface: None,
            capture: None,
            exit_error: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = &self.window {
            return Some(window.clone());
        }

        let attributes = Window::default_attributes()
            .with_title(app_info::APP_NAME)
            .with_inner_size(winit::dpi::LogicalSize::new(
                preview::WINDOW_WIDTH,
                preview::WINDOW_HEIGHT,
            ));
        match event_loop.create_window(attributes) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(e) => {
                self.fail(event_loop, AppError::Gpu(format!("Failed to create window: {}", e)));
                None
            }
        }
    }

    fn start_capture(&mut self) {
        if self.capture.is_some() {
            return;
        }
        if self.surface.as_ref().is_some_and(SurfaceState::is_failed) {
            debug!("Pipeline failed, not starting capture");
            return;
        }

        let spec = self.options.source.clone();
        let facing = self.facing;
        let (width, height) = (self.options.width, self.options.height);
        let policy = self.options.retry;
        let proxy = self.proxy.clone();

        info!(facing = %facing, width, height, "Starting capture");
        let stats = FrameStats::new(self.options.fps_window).with_cpu(self.cpu.clone());
        self.capture = Some(start_preview_capture(
            move || open_with_retry(&policy, |_| open_source(&spec, facing, width, height)),
            Arc::clone(&self.channel),
            stats,
            move |e| {
                let _ = proxy.send_event(PreviewEvent::CaptureFailed(e.to_string()));
            },
        ));
    }

    /// Release the camera
    fn stop_capture(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            info!("Releasing capture");
            capture.stop();
        }
    }

    fn switch_facing(&mut self) {
        self.facing = self.facing.toggled();
        info!(facing = %self.facing, "Switching camera");
        self.stop_capture();
        // Drop a frame of the old session still waiting in the slot
        let _ = self.channel.drain();
        if let Some(state) = self.surface.as_mut() {
            state.context.set_facing(self.facing);
        }
        self.start_capture();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: AppError) {
        error!(error = %e, "Preview stopped");
        self.exit_error = Some(e);
        self.stop_capture();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.surface.as_mut() else {
            return;
        };
        // Keep whatever the surface showed last
        if state.is_failed() {
            return;
        }

        let output = match state.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                match err {
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                        warn!(error = ?err, "Surface lost, reconfiguring");
                        state.surface.configure(&state.gpu.device, &state.config);
                        state.context.invalidate_crop();
                        self.channel.request_render();
                    }
                    wgpu::SurfaceError::Timeout => {
                        warn!("Surface timeout, skipping frame");
                    }
                    wgpu::SurfaceError::OutOfMemory => {
                        self.fail(event_loop, AppError::Gpu("Surface out of memory".to_string()));
                    }
                    wgpu::SurfaceError::Other => {
                        warn!(error = ?err, "Surface error, skipping frame");
                    }
                }
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        match state
            .context
            .render(&state.gpu.device, &state.gpu.queue, &view, &self.channel)
        {
            Ok(outcome) => {
                debug!(outcome = ?outcome, "Rendered");
                if let Some(window) = &self.window {
                    window.pre_present_notify();
                }
                output.present();
            }
            Err(e) if e.is_terminal() => {
                error!(error = %e, "Preview pipeline failed, rendering stopped");
                self.stop_capture();
            }
            Err(PipelineError::PlaneSizeMismatch { .. }) => {
                warn!("Capture size changed, rebuilding render context");
                match state.rebuild_context() {
                    // Draw the frame that arrived with the new size
                    Ok(()) => self.channel.request_render(),
                    Err(e) => {
                        error!(error = %e, "Preview pipeline failed, rendering stopped");
                        self.stop_capture();
                    }
                }
            }
            Err(_) => {
                // Draw aborted; next frame tries again
            }
        }
    }
}

impl ApplicationHandler<PreviewEvent> for PreviewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.ensure_window(event_loop) else {
            return;
        };

        if self.surface.is_none() {
            match SurfaceState::create(window.clone(), self.facing) {
                Ok(state) => self.surface = Some(state),
                Err(e) => {
                    self.fail(event_loop, e);
                    return;
                }
            }
        }

        self.start_capture();
        window.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        info!("Suspended");
        self.stop_capture();
        // GPU handles go away together with the surface
        self.surface = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.stop_capture();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = self.surface.as_mut() {
                    state.resize(size.width, size.height);
                }
                window.request_redraw();
            }
            WindowEvent::Occluded(true) => {
                info!("Window hidden, pausing capture");
                self.stop_capture();
            }
            WindowEvent::Occluded(false) => {
                info!("Window visible, resuming capture");
                self.start_capture();
                window.request_redraw();
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key {
                    Key::Character(c) if c.eq_ignore_ascii_case("c") => self.switch_facing(),
                    Key::Named(NamedKey::Escape) => {
                        self.stop_capture();
                        event_loop.exit();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: PreviewEvent) {
        match event {
            PreviewEvent::FrameReady => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            PreviewEvent::CaptureFailed(message) => {
                self.capture = None;
                self.fail(event_loop, AppError::Other(format!("Camera unavailable: {}", message)));
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.stop_capture();
    }
}

/// Open the preview window and block until it is closed
pub fn run(options: PreviewOptions) -> AppResult<()> {
    let event_loop = EventLoop::<PreviewEvent>::with_user_event()
        .build()
        .map_err(|e| AppError::Other(format!("Failed to create event loop: {}", e)))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("cpu-sampler")
        .enable_all()
        .build()?;
    let sampler = CpuSampler::start_on(
        runtime.handle(),
        options.cpu_sample_interval,
        options.cpu_average_window,
    );

    let mut app = PreviewApp::new(options, event_loop.create_proxy(), sampler.readings());
    let result = event_loop.run_app(&mut app);

    app.stop_capture();
    runtime.block_on(sampler.shutdown());

    result.map_err(|e| AppError::Other(format!("Event loop failed: {}", e)))?;
    match app.exit_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
