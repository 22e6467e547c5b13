use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::platform::{DeviceProfile, EdgeInsets, Size};
use crate::rendering::layout::{self, LayoutEnv, LayoutNode, Rect};
use crate::rendering::{paint, raster, RenderContext, Snapshot, View};
use crate::scenario::Scenario;
use crate::waiter::{RenderWaiter, WaitOutcome};
use crate::{Error, RendererConfig, Result};

/// A transform applied to every scenario's display tree before layout.
pub type ViewTransform = Arc<dyn Fn(View) -> View + Send + Sync>;

type Reply = Box<dyn FnOnce(Result<Snapshot>) + Send>;

/// Per-request render options.
#[derive(Clone)]
pub struct RenderOptions {
    /// Output scale; `None` uses the device profile's scale.
    pub scale: Option<f64>,
    /// Caps the container per axis (the smaller of this and the device size).
    pub max_size: Option<Size>,
    pub transform: Option<ViewTransform>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { scale: None, max_size: None, transform: None }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("scale", &self.scale)
            .field("max_size", &self.max_size)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

struct RenderJob {
    scenario: Scenario,
    device: DeviceProfile,
    options: RenderOptions,
    reply: Reply,
    /// Channel back to the render thread for a deferred capture.
    resume: Sender<Command>,
}

/// Content that has been built and is ready (or waiting) to be captured.
struct Mounted {
    job: RenderJob,
    view: View,
    container: Size,
    env: LayoutEnv,
    waiter: RenderWaiter,
    wait_started: Instant,
}

enum Command {
    Render(RenderJob),
    Capture(Box<Mounted>, WaitOutcome),
}

/// Off-screen renderer backed by a dedicated render thread.
///
/// Mounting, layout and rasterization all happen on that one thread. Waits
/// on a scenario's [`RenderWaiter`] run on short-lived background threads
/// so one slow scenario does not stall the others. The thread exits once
/// every handle has been dropped and no deferred capture is pending.
#[derive(Clone)]
pub struct Renderer {
    cmd_tx: Sender<Command>,
}

impl Renderer {
    /// Spawn the render thread.
    pub fn new(config: RendererConfig) -> Result<Self> {
        if config.pixel_ceiling == 0 {
            return Err(Error::ConfigError("pixel_ceiling must be positive".to_string()));
        }
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

        thread::Builder::new()
            .name("rfplaybook-render".to_string())
            .spawn(move || {
                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Render(job) => match mount(job, &config) {
                            Ok(mounted) if mounted.waiter.is_waiting() => defer_capture(mounted),
                            Ok(mounted) => capture(mounted, WaitOutcome::Fulfilled, &config),
                            Err((reply, err)) => reply(Err(err)),
                        },
                        Command::Capture(mounted, outcome) => capture(*mounted, outcome, &config),
                    }
                }
                debug!("render thread exiting");
            })
            .map_err(|e| Error::InitializationError(format!("failed to spawn render thread: {}", e)))?;

        Ok(Self { cmd_tx })
    }

    /// Queue a render; `handler` runs on the render thread with the result.
    pub fn render_with<F>(&self, scenario: Scenario, device: DeviceProfile, options: RenderOptions, handler: F)
    where
        F: FnOnce(Result<Snapshot>) + Send + 'static,
    {
        let job = RenderJob { scenario, device, options, reply: Box::new(handler), resume: self.cmd_tx.clone() };
        if let Err(mpsc::SendError(Command::Render(job))) = self.cmd_tx.send(Command::Render(job)) {
            (job.reply)(Err(Error::Other("render thread is gone".to_string())));
        }
    }

    /// Render a scenario and await the snapshot.
    pub async fn render(&self, scenario: Scenario, device: DeviceProfile, options: RenderOptions) -> Result<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.render_with(scenario, device, options, move |res| {
            let _ = tx.send(res);
        });
        rx.await
            .map_err(|e| Error::Other(format!("Render canceled: {}", e)))?
    }

    /// Blocking variant of [`Renderer::render`] for non-async callers.
    pub fn render_blocking(&self, scenario: Scenario, device: DeviceProfile, options: RenderOptions) -> Result<Snapshot> {
        let (tx, rx) = mpsc::channel();
        self.render_with(scenario, device, options, move |res| {
            let _ = tx.send(res);
        });
        rx.recv()
            .map_err(|e| Error::Other(format!("Render canceled: {}", e)))?
    }
}

fn mount(job: RenderJob, config: &RendererConfig) -> std::result::Result<Mounted, (Reply, Error)> {
    if let Err(e) = raster::check_scale(job.options.scale.unwrap_or(job.device.scale)) {
        return Err((job.reply, e));
    }
    let device = &job.device;
    let container = match job.options.max_size {
        Some(max) => device.size.min(max),
        None => device.size,
    };
    let waiter = RenderWaiter::with_default_wait(config.default_wait);
    let context = RenderContext {
        waiter: waiter.clone(),
        is_snapshot: true,
        screen_size: device.size,
        // status bar is hidden while capturing
        safe_area: EdgeInsets { top: 0.0, ..device.safe_area },
        appearance: device.appearance,
        layout_direction: device.layout_direction,
    };
    let env = LayoutEnv { safe_area: context.safe_area, direction: context.layout_direction };

    let built = panic::catch_unwind(AssertUnwindSafe(|| {
        let view = job.scenario.render(&context);
        match &job.options.transform {
            Some(transform) => transform(view),
            None => view,
        }
    }));
    match built {
        Ok(view) => Ok(Mounted { job, view, container, env, waiter, wait_started: Instant::now() }),
        Err(payload) => {
            let scenario = &job.scenario;
            let err = Error::ContentPanicked {
                scenario: scenario.name().to_string(),
                file: scenario.file(),
                line: scenario.line(),
                message: panic_message(payload.as_ref()),
            };
            Err((job.reply, err))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn defer_capture(mounted: Mounted) {
    debug!("scenario `{}` is waiting; capture deferred", mounted.job.scenario.name());
    let waiter = mounted.waiter.clone();
    let tx = mounted.job.resume.clone();
    let mounted = Box::new(mounted);
    let spawned = thread::Builder::new()
        .name("rfplaybook-await".to_string())
        .spawn(move || {
            let outcome = waiter.block_until_ready();
            let _ = tx.send(Command::Capture(mounted, outcome));
        });
    if let Err(e) = spawned {
        // The closure (and the job's reply) is dropped with the error.
        warn!("failed to spawn await thread: {}", e);
    }
}

/// Lay out the final view and rasterize it. Sizing happens here, after any
/// wait, so content filled in late is measured at its final bounds.
fn capture(mounted: Mounted, outcome: WaitOutcome, config: &RendererConfig) {
    let Mounted { job, view, container, env, wait_started, .. } = mounted;
    if outcome == WaitOutcome::DeadlineElapsed {
        (job.reply)(Err(Error::NotReady {
            scenario: job.scenario.name().to_string(),
            waited: wait_started.elapsed(),
        }));
        return;
    }

    let resolved = layout::resolve_content_size(
        job.scenario.name(),
        (job.scenario.file(), job.scenario.line()),
        job.scenario.layout(),
        &view,
        container,
        &env,
    );
    let size = match resolved {
        Ok(size) => size,
        Err(e) => {
            (job.reply)(Err(e));
            return;
        }
    };

    let requested = job.options.scale.unwrap_or(job.device.scale);
    let scale = raster::fit_scale(size, requested, config.pixel_ceiling);
    if scale < requested {
        debug!(
            "scenario `{}` exceeds the {}px ceiling; drawing at {:.3}x instead of {}x",
            job.scenario.name(),
            config.pixel_ceiling,
            scale,
            requested
        );
    }

    let mut nodes: Vec<LayoutNode> = Vec::new();
    layout::place(&view, Rect::new(0.0, 0.0, size.width, size.height), &env, &mut nodes);
    let commands = paint::paint_nodes(&nodes, scale, job.device.appearance);
    let (width, height) = raster::pixel_size(size, scale);
    let image = raster::rasterize(width, height, &commands);
    (job.reply)(Ok(Snapshot::new(image, scale)));
}
