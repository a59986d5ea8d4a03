use std::{
    error, fs,
    io::Read,
    path::{Path, PathBuf},
};

use clap::{Parser, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use emu::video::frame::PixelDepth;
use emu::video::memory::GraphicsRam;
use emu::video::registers::RegisterBank;
use emu::video::{Video, VideoOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Depth {
    #[value(name = "8")]
    Indexed8,
    #[value(name = "16")]
    Indexed16,
}

impl From<Depth> for PixelDepth {
    fn from(depth: Depth) -> Self {
        match depth {
            Depth::Indexed8 => Self::Indexed8,
            Depth::Indexed16 => Self::Indexed16,
        }
    }
}

/// Renders a snapshot of CPS1 video memory to a PNG.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Title (or clone) whose board configuration is used.
    #[arg(long)]
    title: String,

    /// Graphics ROM region: four bit-planes one after the other.
    #[arg(long)]
    gfx: PathBuf,

    /// Graphics RAM dump, padded or cut to 192KB. Empty RAM when missing.
    #[arg(long)]
    gfx_ram: Option<PathBuf>,

    /// Output register dump, big-endian words. Reset values when missing.
    #[arg(long)]
    registers: Option<PathBuf>,

    /// Frames to render. Sprites show from the second frame on, once the
    /// object table has been latched.
    #[arg(long, default_value_t = 2)]
    frames: u32,

    /// Overrides the title's pixel depth.
    #[arg(long, value_enum)]
    depth: Option<Depth>,

    #[arg(long, default_value = "frame.png")]
    out: PathBuf,

    /// Log to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_deref())?;

    run(&args)
}

fn init_logging(log_file: Option<&Path>) -> Result<WorkerGuard, Box<dyn error::Error>> {
    let (writer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().ok_or("log file path has no file name")?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(directory, name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .init();

    Ok(guard)
}

fn run(args: &Args) -> Result<(), Box<dyn error::Error>> {
    let gfx = read_file(&args.gfx)?;
    let options = VideoOptions {
        depth: args.depth.map(PixelDepth::from),
        ..VideoOptions::default()
    };
    let mut video = Video::from_title(&args.title, &gfx, options)?;

    let gram = match &args.gfx_ram {
        Some(path) => GraphicsRam::from_bytes(&read_file(path)?),
        None => GraphicsRam::default(),
    };
    let bank = match &args.registers {
        Some(path) => RegisterBank::from_be_bytes(&read_file(path)?),
        None => RegisterBank::with_defaults(video.config()),
    };

    for _ in 0..args.frames.max(1) {
        video.render_frame(&bank, &gram);
        video.end_of_frame(&bank, &gram);
    }

    let stats = video.stats();
    tracing::info!(
        frames = stats.frame,
        sprites = stats.sprites_drawn,
        tiles = ?stats.tiles_drawn,
        colors = stats.colors_used,
        "rendered"
    );

    save_png(&video, &args.out)?;
    tracing::info!(path = %args.out.display(), "frame written");

    Ok(())
}

fn save_png(video: &Video, path: &Path) -> Result<(), Box<dyn error::Error>> {
    let (width, height) = video.frame().size();
    let image = image::RgbImage::from_raw(
        u32::try_from(width)?,
        u32::try_from(height)?,
        video.to_rgb(),
    )
    .ok_or("frame buffer does not match the frame size")?;
    image.save(path)?;

    Ok(())
}

fn read_file(filepath: &Path) -> Result<Vec<u8>, Box<dyn error::Error>> {
    let mut f = fs::File::open(filepath)?;
    let mut buf = vec![];
    f.read_to_end(&mut buf)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_have_defaults() {
        let args = Args::try_parse_from(["cpsview", "--title", "sf2", "--gfx", "sf2.gfx"]).unwrap();
        assert_eq!(args.title, "sf2");
        assert_eq!(args.frames, 2);
        assert_eq!(args.depth, None);
        assert_eq!(args.out, PathBuf::from("frame.png"));
    }

    #[test]
    fn depth_takes_bits() {
        let args = Args::try_parse_from([
            "cpsview", "--title", "sf2", "--gfx", "g", "--depth", "16",
        ])
        .unwrap();
        assert_eq!(args.depth, Some(Depth::Indexed16));
        assert!(
            Args::try_parse_from(["cpsview", "--title", "sf2", "--gfx", "g", "--depth", "24"])
                .is_err()
        );
    }
}
