use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rfplaybook::rendering::raster::check_scale;
use rfplaybook::{
    DeviceProfile, EdgeInsets, ExportConfig, Orientation, Paint, Playbook, RenderContext, Renderer,
    RendererConfig, Rgba, Scenario, ScenarioLayout, SnapshotExport, SnapshotFormat, View, ViewSlot,
    ViewTransform,
};

#[derive(Parser)]
#[command(name = "rfplaybook", version, about = "Scenario catalog snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every scenario on every device into $SNAPSHOT_DIR
    Export(ExportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Remove the target directory first
    #[arg(long)]
    clean: bool,

    /// png, jpeg, or jpeg:<quality 0..1>
    #[arg(long, default_value = "png")]
    format: SnapshotFormat,

    /// Render scale (defaults to each device's scale)
    #[arg(long, value_parser = parse_scale)]
    scale: Option<f64>,

    /// Device preset such as iphone-x or iphone-12-landscape (repeatable)
    #[arg(long = "device")]
    devices: Vec<String>,

    /// JSON file holding an array of device profiles
    #[arg(long)]
    devices_file: Option<PathBuf>,

    /// Global deadline in seconds
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Paint this color (#rrggbb) behind every scenario
    #[arg(long)]
    background: Option<String>,
}

fn parse_scale(s: &str) -> std::result::Result<f64, String> {
    let scale: f64 = s.parse().map_err(|e| format!("`{}` is not a number: {}", s, e))?;
    check_scale(scale).map_err(|e| e.to_string())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Export(args) => export(args),
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn export(args: ExportArgs) -> Result<()> {
    let directory = std::env::var_os("SNAPSHOT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Set the SNAPSHOT_DIR environment variable to the export directory"))?;

    let mut devices = Vec::new();
    for id in &args.devices {
        match DeviceProfile::preset(id) {
            Some(device) => devices.push(device),
            None => bail!("unknown device preset `{}`", id),
        }
    }
    if let Some(path) = &args.devices_file {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut loaded: Vec<DeviceProfile> =
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        devices.append(&mut loaded);
    }
    if devices.is_empty() {
        devices.push(DeviceProfile::iphone_x(Orientation::Portrait));
    }

    let transform = match &args.background {
        Some(hex) => {
            let color = Rgba::from_hex(hex).ok_or_else(|| anyhow!("invalid color `{}`", hex))?;
            let transform: ViewTransform = Arc::new(move |view: View| view.background(color));
            Some(transform)
        }
        None => None,
    };

    let config = ExportConfig {
        clean: args.clean,
        format: args.format,
        timeout: Duration::from_secs(args.timeout),
        scale: args.scale,
        transform,
        ..ExportConfig::new(directory, devices)
    };

    let renderer = Renderer::new(RendererConfig::default())?;
    let export = SnapshotExport::new(config, renderer);
    demo_playbook().run(&[&export])?;
    Ok(())
}

fn demo_playbook() -> Playbook {
    let accent = Rgba::rgb(0, 122, 255);
    let mut playbook = Playbook::new();

    playbook.add_scenarios(
        "Buttons",
        [
            Scenario::new("Primary", ScenarioLayout::compressed(), move |_: &RenderContext| {
                View::rect(160.0, 44.0, accent).padding(EdgeInsets::all(8.0))
            }),
            Scenario::new("Outlined", ScenarioLayout::compressed(), move |_: &RenderContext| {
                View::rect(160.0, 44.0, Paint::background()).border(accent, 2.0)
            }),
        ],
    );

    playbook.add_scenarios(
        "Screens",
        [
            Scenario::new("Feed", ScenarioLayout::fill(), |_: &RenderContext| {
                let row = || View::color(Paint::label()).frame(None, Some(64.0));
                View::vstack(8.0, vec![row(), row(), row(), View::color(Paint::background())])
                    .safe_area()
                    .background(Paint::background())
            }),
            Scenario::new("Remote image", ScenarioLayout::fixed_length(200.0), |ctx: &RenderContext| {
                let slot = ViewSlot::new(View::color(Rgba::rgb(200, 200, 200)));
                ctx.waiter.wait();
                let (waiter, filled) = (ctx.waiter.clone(), slot.clone());
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(50));
                    filled.set(View::color(Rgba::rgb(52, 199, 89)));
                    waiter.fulfill();
                });
                View::Slot(slot)
            }),
        ],
    );

    playbook
}
