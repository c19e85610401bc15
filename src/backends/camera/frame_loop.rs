// SPDX-License-Identifier: GPL-3.0-only
//! Producer thread lifecycle
//!
//! A capture loop runs on its own thread, pulls frames from a
//! [`CaptureSource`] and publishes them into a [`FrameChannel`]. The thread
//! never touches GPU state.

use super::CaptureSource;
use crate::constants::timing;
use crate::diagnostics::FrameStats;
use crate::errors::{CaptureError, CaptureResult};
use crate::render::{FrameChannel, RenderTrigger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::start("synthetic", move || {
///     match source.next_frame() {
///         Ok(frame) => {
///             channel.publish(frame);
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Stop,
///     }
/// });
///
/// // Later, stop the loop
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Initialization error, if the loop never started
    failure: Arc<Mutex<Option<CaptureError>>>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a separate thread
    ///
    /// The provided closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Start a capture loop with initialization
    ///
    /// The `init_fn` is called once at the start of the thread to set up
    /// resources (typically opening the device). If initialization fails, the
    /// error is kept in [`CaptureLoopController::failure`] and the thread exits.
    ///
    /// # Arguments
    ///
    /// * `name` - A descriptive name for the loop
    /// * `init_fn` - Initialization closure, returns the loop state
    /// * `loop_fn` - Loop closure that receives the state and returns LoopAction
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> CaptureResult<S> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let failure = Arc::new(Mutex::new(None));
        let failure_clone = Arc::clone(&failure);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => {
                    debug!(name = %name_clone, "Initialization successful");
                    s
                }
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Initialization failed");
                    *failure_clone.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                    return;
                }
            };

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            failure,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Error that prevented the loop from starting
    pub fn failure(&self) -> Option<CaptureError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    ///
    /// Useful if the loop stops itself via `LoopAction::Stop`.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Open a source on a new thread and publish its frames into `channel`.
///
/// `open` runs on the capture thread (retries included); if it fails,
/// `on_failure` receives the error and the loop never starts.
pub fn start_preview_capture<T, O, N>(
    open: O,
    channel: Arc<FrameChannel<T>>,
    mut stats: FrameStats,
    on_failure: N,
) -> CaptureLoopController
where
    T: RenderTrigger + 'static,
    O: FnOnce() -> CaptureResult<Box<dyn CaptureSource>> + Send + 'static,
    N: FnOnce(CaptureError) + Send + 'static,
{
    let mut errors: u64 = 0;

    let init = move || {
        open().map_err(|e| {
            on_failure(e.clone());
            e
        })
    };

    CaptureLoopController::start_with_init("preview-capture", init, move |source| {
        match source.next_frame() {
            Ok(frame) => {
                stats.record(frame.captured_at());
                channel.publish(frame);
            }
            Err(e) => {
                errors += 1;
                if errors % timing::FRAME_LOG_INTERVAL == 1 {
                    warn!(source = source.name(), error = %e, failures = errors, "Failed to capture frame");
                }
                thread::sleep(timing::CAPTURE_ERROR_BACKOFF);
            }
        }
        LoopAction::Continue
    })
}
