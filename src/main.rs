//! `starfield [config.json] [--snapshot out.png] [--frames N] [--size WxH]`
//!
//! Without `--snapshot`, opens a window. With it, renders `N` frames
//! headlessly at the configured fps and writes the last one as a PNG.

use std::process::ExitCode;

use starfield::{FixedSize, FrameLoop, Pixmap, Starfield, StarfieldConfig};

struct Args {
    config: Option<String>,
    snapshot: Option<String>,
    frames: usize,
    size: (u32, u32),
}

fn usage() -> &'static str {
    "usage: starfield [config.json] [--snapshot out.png] [--frames N] [--size WxH]"
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        snapshot: None,
        frames: 180,
        size: (1024, 318),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--snapshot" => args.snapshot = Some(iter.next().ok_or("--snapshot needs a path")?),
            "--frames" => {
                let n = iter.next().ok_or("--frames needs a count")?;
                args.frames = n.parse().map_err(|_| format!("invalid frame count: {}", n))?;
            }
            "--size" => {
                let s = iter.next().ok_or("--size needs WxH")?;
                args.size = parse_size(&s).ok_or_else(|| format!("invalid size: {}", s))?;
            }
            "-h" | "--help" => return Err(usage().to_string()),
            other if other.starts_with("--") => return Err(format!("unknown option {}\n{}", other, usage())),
            path => args.config = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn snapshot(config: StarfieldConfig, args: &Args, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = args.size;
    let fps = config.fps as f64;
    let mut engine = Starfield::new(config);
    if !engine.attach(Some(Pixmap::new(width, height)), FixedSize::new(width, height)) {
        return Err(format!("cannot render into a {}x{} surface", width, height).into());
    }
    engine.start();

    let rendered = FrameLoop::at_fps(fps).run(&mut engine, args.frames);
    log::info!(
        "rendered {} frames, {} stars, {} links",
        rendered,
        engine.stars().len(),
        engine.edges().len()
    );

    if let Some(pixmap) = engine.surface() {
        pixmap.save_png(path)?;
        println!("Wrote {}", path);
    }
    engine.dispose();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    let config = match &args.config {
        Some(path) => match StarfieldConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => StarfieldConfig::default(),
    };

    let result = match &args.snapshot {
        Some(path) => snapshot(config, &args, path),
        None => starfield::run(config).map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
