//! Batch export of every scenario on every device to a directory tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cache::normalize;
use crate::format::SnapshotFormat;
use crate::platform::DeviceProfile;
use crate::renderer::{RenderOptions, Renderer, ViewTransform};
use crate::rendering::Snapshot;
use crate::scenario::{Playbook, TestTool};
use crate::{Error, Result};

/// Default global deadline of an export run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

const PUMP_SLICE: Duration = Duration::from_millis(100);

/// Settings of one export run.
#[derive(Clone)]
pub struct ExportConfig {
    /// Base directory; files land in `{directory}/{device}/{category}/{scenario}.{ext}`.
    pub directory: PathBuf,
    /// Remove `directory` before exporting.
    pub clean: bool,
    pub format: SnapshotFormat,
    /// Deadline for the whole run.
    pub timeout: Duration,
    /// Render scale; `None` uses each device's own scale.
    pub scale: Option<f64>,
    pub devices: Vec<DeviceProfile>,
    /// Applied to every scenario's view before layout.
    pub transform: Option<ViewTransform>,
}

impl ExportConfig {
    pub fn new(directory: impl Into<PathBuf>, devices: Vec<DeviceProfile>) -> Self {
        Self {
            directory: directory.into(),
            clean: false,
            format: SnapshotFormat::default(),
            timeout: DEFAULT_TIMEOUT,
            scale: None,
            devices,
            transform: None,
        }
    }
}

/// Exports snapshot files for a playbook.
pub struct SnapshotExport {
    config: ExportConfig,
    renderer: Renderer,
}

impl SnapshotExport {
    pub fn new(config: ExportConfig, renderer: Renderer) -> Self {
        Self { config, renderer }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Render every scenario × device and write the files.
    ///
    /// Blocks the calling thread. Fails with [`Error::Timeout`] when the
    /// deadline passes, with the layout error as soon as a scenario lays out
    /// empty, and otherwise with [`Error::WritingFailure`] listing every
    /// destination that could not be produced.
    pub fn run(&self, playbook: &Playbook) -> Result<()> {
        let config = &self.config;
        let deadline = Instant::now() + config.timeout;

        if config.clean && config.directory.exists() {
            debug!("removing {}", config.directory.display());
            fs::remove_dir_all(&config.directory)?;
        }

        let (tx, rx) = mpsc::channel::<(PathBuf, Result<Snapshot>)>();
        let mut pending = 0usize;

        for device in &config.devices {
            let device_dir = config.directory.join(normalize(&device.name));
            for store in playbook.stores() {
                let dir = device_dir.join(normalize(store.category()));
                fs::create_dir_all(&dir)?;

                for scenario in store.scenarios() {
                    let path = destination(&dir, scenario.name(), config.format);
                    let options = RenderOptions {
                        scale: config.scale,
                        max_size: None,
                        transform: config.transform.clone(),
                    };
                    let tx = tx.clone();
                    self.renderer.render_with(scenario.clone(), device.clone(), options, move |res| {
                        let _ = tx.send((path, res));
                    });
                    pending += 1;
                }
            }
        }
        drop(tx);
        debug!("issued {} render(s) for {} device(s)", pending, config.devices.len());

        let mut failures = Vec::new();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(config.timeout));
            }
            match rx.recv_timeout(remaining.min(PUMP_SLICE)) {
                Ok((path, res)) => {
                    pending -= 1;
                    match res {
                        Ok(snapshot) => {
                            if let Err(e) = write(&snapshot, config.format, &path) {
                                warn!("failed to write {}: {}", path.display(), e);
                                failures.push(path);
                            }
                        }
                        Err(e) if e.is_programmer_error() => return Err(e),
                        Err(e) => {
                            warn!("failed to render {}: {}", path.display(), e);
                            failures.push(path);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Other(format!("{} render(s) were dropped", pending)));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort();
            Err(Error::WritingFailure(failures))
        }
    }
}

impl TestTool for SnapshotExport {
    fn run(&self, playbook: &Playbook) -> Result<()> {
        SnapshotExport::run(self, playbook)
    }
}

fn destination(dir: &Path, scenario: &str, format: SnapshotFormat) -> PathBuf {
    dir.join(format!("{}.{}", normalize(scenario), format.file_extension()))
}

fn write(snapshot: &Snapshot, format: SnapshotFormat, path: &Path) -> Result<()> {
    let bytes = format.encode(&snapshot.image)?;
    fs::write(path, bytes)?;
    Ok(())
}
