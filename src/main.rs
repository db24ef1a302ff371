use std::path::PathBuf;
use std::sync::Arc;

use camera_mapper::{ConsoleAnnotator, Explorer, MapperConfig, SessionContext};
use cammap_capture::AdbDevice;
use cammap_data::MappingRequirements;
use cammap_vision::{TesseractRecognizer, TextRecognizer};
use tracing::info;

fn usage() -> ! {
    eprintln!(
        "usage: camera-mapper <device-address> [--output <dir>] [--tmp <dir>] \
         [--requirements <file>] [--start-step <n>] [--debug-overlays]"
    );
    std::process::exit(2);
}

fn parse_args() -> anyhow::Result<MapperConfig> {
    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else { usage() };
    if address.starts_with('-') {
        usage();
    }

    let mut config = MapperConfig::new(address);
    config.output_dir = PathBuf::from("mappings");
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--output" => config.output_dir = PathBuf::from(args.next().unwrap_or_else(|| usage())),
            "--tmp" => config.tmp_dir = PathBuf::from(args.next().unwrap_or_else(|| usage())),
            "--requirements" => {
                let path = PathBuf::from(args.next().unwrap_or_else(|| usage()));
                config.requirements = MappingRequirements::load(&path)?;
            }
            "--start-step" => {
                config.start_step = args
                    .next()
                    .unwrap_or_else(|| usage())
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid --start-step: {e}"))?;
            }
            "--debug-overlays" => config.debug_overlays = true,
            _ => usage(),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "camera_mapper=debug,cammap_capture=debug,cammap_vision=debug".into()
            }),
        )
        .init();

    let config = parse_args()?;
    info!(
        "mapping device {} (start step {})",
        config.device_address, config.start_step
    );

    let device = Arc::new(AdbDevice::new());
    let annotator = Arc::new(ConsoleAnnotator);
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractRecognizer::new());

    let session = SessionContext::new(config, device, annotator, Some(recognizer))?;
    let catalogue = Explorer::new(session).run().await?;
    info!("done: {} commands recorded", catalogue.commands.len());
    Ok(())
}
