//! Headless export: mount the viewer off-screen, load a model, apply a decal and a tint, render a
//! few frames and write the PNG.
//! Run: cargo run -p debug --bin export_mug -- --image logo.png --color "#ff8800" --out out/

use std::path::PathBuf;

use mockup_viewer::{
    AssetSource, FixedRefresh, HeadlessBackend, HeadlessTarget, Viewer, ViewerConfig, ViewerThread,
};
use render_api::RenderBackend;

const USAGE: &str = "usage: export_mug [--model PATH] [--image PATH] [--color VALUE] [--out DIR] \
[--dpr RATIO] [--frames N] [--config PATH] [--gpu]";

struct Args {
    model: Option<PathBuf>,
    image: Option<PathBuf>,
    color: Option<String>,
    out: PathBuf,
    dpr: f32,
    frames: u32,
    config: Option<PathBuf>,
    gpu: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        model: None,
        image: None,
        color: None,
        out: PathBuf::from("."),
        dpr: 1.0,
        frames: 30,
        config: None,
        gpu: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{} needs a value\n{}", flag, USAGE));
        match flag.as_str() {
            "--model" => args.model = Some(PathBuf::from(value()?)),
            "--image" => args.image = Some(PathBuf::from(value()?)),
            "--color" => args.color = Some(value()?),
            "--out" => args.out = PathBuf::from(value()?),
            "--dpr" => args.dpr = value()?.parse().map_err(|e| format!("--dpr: {}", e))?,
            "--frames" => args.frames = value()?.parse().map_err(|e| format!("--frames: {}", e))?,
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--gpu" => args.gpu = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument {}\n{}", other, USAGE)),
        }
    }
    Ok(args)
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => ViewerConfig::from_path(path).map_err(|e| e.to_string())?,
        None => ViewerConfig::default(),
    };
    if args.gpu {
        let backend = mockup_bridge::MockupPlugin::new_offscreen()?;
        export(Viewer::new(backend, config), &args)
    } else {
        export(Viewer::new(HeadlessBackend::new(), config), &args)
    }
}

fn export<B: RenderBackend + 'static>(viewer: Viewer<B>, args: &Args) -> Result<(), String> {
    let image = match &args.image {
        Some(path) => Some(std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?),
        None => None,
    };
    let source = match &args.model {
        Some(path) => AssetSource::Path(path.clone()),
        None => AssetSource::Bundled,
    };

    let refresh = FixedRefresh::default();
    let frame_time = refresh.interval();
    let timeline = ViewerThread::spawn(viewer, Box::new(HeadlessTarget::new(args.dpr)), refresh)
        .map_err(|e| e.to_string())?;
    timeline.load(source).map_err(|e| e.to_string())?;
    if let Some(bytes) = image {
        timeline.select_image(bytes).map_err(|e| e.to_string())?;
    }
    if let Some(color) = &args.color {
        timeline.select_color(color).map_err(|e| e.to_string())?;
    }
    timeline.flush().map_err(|e| e.to_string())?;
    // Let auto-rotation and damping run for a while before the still is taken.
    std::thread::sleep(frame_time * args.frames);

    let exported = timeline.export().map_err(|e| e.to_string())?;
    std::fs::create_dir_all(&args.out).map_err(|e| format!("{}: {}", args.out.display(), e))?;
    let path = exported.write_to(&args.out).map_err(|e| e.to_string())?;
    log::info!("{}x{} -> {}", exported.width, exported.height, path.display());

    if let Some(viewer) = timeline.unmount() {
        log::info!("released: {:?}", viewer.backend().resource_counts());
    }
    Ok(())
}
