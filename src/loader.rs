//! Throttled, cancellable "cached image or render" service for gallery
//! thumbnails.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::join_all;
use image::RgbaImage;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::cache::{CacheKey, ClearScope, DiskCache};
use crate::dispatcher::{DispatchHandle, SerialDispatcher, DEFAULT_INTERVAL};
use crate::format;
use crate::platform::DeviceProfile;
use crate::renderer::{RenderOptions, Renderer};
use crate::rendering::raster;
use crate::scenario::{Playbook, Scenario};
use crate::{Error, Result};

/// Tuning for [`LoadQueue`].
#[derive(Debug, Clone)]
pub struct LoadQueueConfig {
    /// Delay between two queued renders.
    pub debounce: Duration,
    /// Consecutive renders allowed before a cooldown.
    pub burst_size: usize,
    pub cooldown: Duration,
    /// How many scenarios [`LoadQueue::pre_render`] renders up front.
    pub pre_snapshot_count_limit: usize,
    /// Render scale; `None` uses each device's own scale.
    pub scale: Option<f64>,
}

impl Default for LoadQueueConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_INTERVAL,
            burst_size: 3,
            cooldown: Duration::from_millis(100),
            pre_snapshot_count_limit: 20,
            scale: None,
        }
    }
}

/// What to load.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub category: String,
    pub scenario: Scenario,
    pub device: DeviceProfile,
}

impl LoadRequest {
    pub fn new(category: impl Into<String>, scenario: Scenario, device: DeviceProfile) -> Self {
        Self { category: category.into(), scenario, device }
    }
}

/// How a load ended. Cancellation is an outcome, not an error.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(RgbaImage),
    Failed(Error),
    Cancelled,
}

impl LoadOutcome {
    pub fn image(self) -> Option<RgbaImage> {
        match self {
            LoadOutcome::Loaded(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Default)]
struct TicketState {
    reply: Option<oneshot::Sender<LoadOutcome>>,
    dispatch: Option<DispatchHandle>,
    cancelled: bool,
}

type SharedTicket = Arc<Mutex<TicketState>>;

fn lock(m: &Mutex<TicketState>) -> MutexGuard<'_, TicketState> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn resolve(ticket: &SharedTicket, outcome: LoadOutcome) {
    if let Some(reply) = lock(ticket).reply.take() {
        let _ = reply.send(outcome);
    }
}

/// Travels with a queued render. If the render is dropped from the queue
/// before it produced an outcome, the ticket resolves as cancelled.
struct QueuedTicket(SharedTicket);

impl Drop for QueuedTicket {
    fn drop(&mut self) {
        resolve(&self.0, LoadOutcome::Cancelled);
    }
}

fn is_cancelled(ticket: &SharedTicket) -> bool {
    lock(ticket).cancelled
}

/// Cancels a pending load from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    ticket: SharedTicket,
}

impl CancelHandle {
    /// Resolve the load as [`LoadOutcome::Cancelled`] and drop its queued
    /// render. A load that already finished is unaffected.
    pub fn cancel(&self) {
        let dispatch = {
            let mut state = lock(&self.ticket);
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            if let Some(reply) = state.reply.take() {
                let _ = reply.send(LoadOutcome::Cancelled);
            }
            state.dispatch.take()
        };
        if let Some(handle) = dispatch {
            handle.cancel();
        }
    }
}

/// A pending load. Await it for the outcome; dropping it cancels the load.
pub struct LoadTicket {
    rx: oneshot::Receiver<LoadOutcome>,
    handle: CancelHandle,
    finished: bool,
}

impl LoadTicket {
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }
}

impl Future for LoadTicket {
    type Output = LoadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadOutcome> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(res) => {
                self.finished = true;
                Poll::Ready(res.unwrap_or(LoadOutcome::Cancelled))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.finished {
            self.handle.cancel();
        }
    }
}

struct Inner {
    renderer: Renderer,
    cache: DiskCache,
    config: LoadQueueConfig,
    dispatcher: SerialDispatcher,
    runtime: Handle,
    /// Renders since the queue last drained.
    burst: tokio::sync::Mutex<usize>,
}

/// Loads scenario images from the cache, rendering misses one at a time.
#[derive(Clone)]
pub struct LoadQueue {
    inner: Arc<Inner>,
}

impl LoadQueue {
    /// Must be called within a tokio runtime.
    pub fn new(renderer: Renderer, cache: DiskCache, config: LoadQueueConfig) -> Result<Self> {
        if config.burst_size == 0 {
            return Err(Error::ConfigError("burst_size must be at least 1".to_string()));
        }
        if let Some(scale) = config.scale {
            raster::check_scale(scale)?;
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::InitializationError(format!("LoadQueue needs a tokio runtime: {}", e)))?;
        let dispatcher = SerialDispatcher::new(config.debounce, runtime.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                renderer,
                cache,
                config,
                dispatcher,
                runtime,
                burst: tokio::sync::Mutex::new(0),
            }),
        })
    }

    pub fn cache(&self) -> &DiskCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &LoadQueueConfig {
        &self.inner.config
    }

    /// The cached image if present, otherwise a queued render.
    pub fn load_image(&self, request: LoadRequest) -> LoadTicket {
        let (tx, rx) = oneshot::channel();
        let ticket: SharedTicket = Arc::new(Mutex::new(TicketState { reply: Some(tx), ..Default::default() }));
        let handle = CancelHandle { ticket: ticket.clone() };

        let queue = self.clone();
        self.inner.runtime.spawn(async move {
            let key = queue.key_for(&request);
            let cache = queue.inner.cache.clone();
            let cached = tokio::task::spawn_blocking(move || load_cached(&cache, &key))
                .await
                .unwrap_or(None);

            if let Some(image) = cached {
                debug!("cache hit for `{}`", request.scenario.name());
                resolve(&ticket, LoadOutcome::Loaded(image));
                return;
            }

            let job_queue = queue.clone();
            let queued = QueuedTicket(ticket.clone());
            let mut state = lock(&ticket);
            if state.cancelled {
                drop(state);
                return;
            }
            state.dispatch = Some(queue.inner.dispatcher.dispatch(async move {
                job_queue.run_queued(request, &queued.0).await;
                drop(queued);
            }));
        });

        LoadTicket { rx, handle, finished: false }
    }

    /// Drop every queued render. Their tickets resolve as
    /// [`LoadOutcome::Cancelled`]; a render already running finishes.
    pub fn cancel_all(&self) {
        self.inner.dispatcher.cancel();
    }

    /// Render and cache `request` right away, bypassing the queue.
    pub async fn render_now(&self, request: LoadRequest) -> Result<RgbaImage> {
        self.render_and_store(&request).await
    }

    /// Clear the cache, then render the first
    /// `pre_snapshot_count_limit` scenarios of `playbook` for `device`.
    /// Failures are logged and skipped.
    pub async fn pre_render(&self, playbook: &Playbook, device: &DeviceProfile) {
        let cache = self.inner.cache.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || cache.clear(ClearScope::All)).await {
            warn!("failed to clear cache before pre-render: {}", e);
        }

        let requests: Vec<LoadRequest> = playbook
            .iter()
            .take(self.inner.config.pre_snapshot_count_limit)
            .map(|(category, scenario)| LoadRequest::new(category, scenario.clone(), device.clone()))
            .collect();
        debug!("pre-rendering {} scenario(s) for {}", requests.len(), device.name);

        let results = join_all(requests.iter().map(|r| self.render_and_store(r))).await;
        for (request, result) in requests.iter().zip(results) {
            if let Err(e) = result {
                warn!("pre-render of `{}` failed: {}", request.scenario.name(), e);
            }
        }
    }

    async fn run_queued(&self, request: LoadRequest, ticket: &SharedTicket) {
        if is_cancelled(ticket) {
            return;
        }
        {
            let mut burst = self.inner.burst.lock().await;
            if *burst >= self.inner.config.burst_size {
                debug!("burst of {} renders reached; cooling down", *burst);
                tokio::time::sleep(self.inner.config.cooldown).await;
                *burst = 0;
            }
            *burst += 1;
        }
        if is_cancelled(ticket) {
            return;
        }

        let outcome = match self.render_and_store(&request).await {
            Ok(image) => LoadOutcome::Loaded(image),
            Err(e) => LoadOutcome::Failed(e),
        };
        resolve(ticket, outcome);

        if self.inner.dispatcher.pending() == 0 {
            *self.inner.burst.lock().await = 0;
        }
    }

    async fn render_and_store(&self, request: &LoadRequest) -> Result<RgbaImage> {
        let options = RenderOptions { scale: self.inner.config.scale, ..Default::default() };
        let snapshot = self
            .inner
            .renderer
            .render(request.scenario.clone(), request.device.clone(), options)
            .await?;

        let key = self.key_for(request);
        let cache = self.inner.cache.clone();
        tokio::task::spawn_blocking(move || -> Result<RgbaImage> {
            let bytes = cache.format().encode(&snapshot.image)?;
            cache.store(&bytes, &key)?;
            Ok(snapshot.image)
        })
        .await
        .map_err(|e| Error::Other(format!("cache write task failed: {}", e)))?
    }

    fn key_for(&self, request: &LoadRequest) -> CacheKey {
        let scale = self.inner.config.scale.unwrap_or(request.device.scale);
        CacheKey::new(&request.category, request.scenario.name(), &request.device, scale)
    }
}

fn load_cached(cache: &DiskCache, key: &CacheKey) -> Option<RgbaImage> {
    let bytes = cache.load(key)?;
    match format::decode(&bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("discarding corrupt cache entry {}: {}", cache.path_for(key).display(), e);
            cache.remove(key);
            None
        }
    }
}
