//! Detect and outline motion in a video.

use bgmotion::prelude::v1::{Result, *};
use clap::*;
use log::*;
use std::fs::File;
use std::io::BufReader;

const DEFAULT_INPUT: &str = "../resources/traffic.mp4";
const DEFAULT_OUTPUT: &str = "../output/motion-detect.avi";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("motion-detect")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::new("input")
                .help("Video file, or a directory of frames")
                .takes_value(true)
                .default_value(DEFAULT_INPUT),
        )
        .arg(
            Arg::new("output")
                .help("Video file, or a directory to write frames to")
                .long("output")
                .short('o')
                .takes_value(true)
                .default_value(DEFAULT_OUTPUT),
        )
        .arg(
            Arg::new("config")
                .help("JSON file overriding the detection parameters")
                .long("config")
                .short('c')
                .takes_value(true),
        )
        .get_matches();

    let input = matches.value_of("input").unwrap_or(DEFAULT_INPUT);
    let output = matches.value_of("output").unwrap_or(DEFAULT_OUTPUT);

    let config = match matches.value_of("config") {
        Some(path) => load_config(path)?,
        None => MotionConfig::default(),
    };

    info!("Input file: {input}");
    info!("Output file: {output}");

    let mut source = frame_loader::create_source(input)?;

    if let Some((width, height)) = source.dimensions() {
        info!("Resolution: {width}x{height}");
    }

    let mut sink = frame_loader::create_sink(output, source.framerate())?;
    let mut pipeline = MotionPipeline::new(config)?;

    let result = pipeline.run(&mut source, &mut sink);

    let stats = pipeline.stats();
    info!(
        "{} frames, {} frames with motion",
        stats.frames, stats.motion_frames
    );
    info!("Elapsed time: {:.2} seconds", stats.elapsed.as_secs_f64());

    result.map(|_| ())
}

/// Load a (possibly partial) `MotionConfig`. Missing fields keep their defaults.
fn load_config(path: &str) -> Result<MotionConfig> {
    let file = File::open(path).with_context(|| format!("Failed to open {path}"))?;
    let config: MotionConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {path}"))?;
    debug!("{config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config() {
        let path = std::env::temp_dir().join(format!("motion-detect-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "alpha": 0.1, "rect_color": [255, 0, 0] }"#).unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.rect_color, [255, 0, 0]);
        assert_eq!(config.diff_threshold, 25);
        assert_eq!(config.dilate_passes, 15);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_config() {
        assert!(load_config("/nonexistent/motion-detect.json").is_err());
    }
}
