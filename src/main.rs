//! micbatch - record a fixed-length clip from the default microphone
//!
//! Settings come from `MICBATCH_*` environment variables (or a `.env` file).

use anyhow::Context;
use micbatch::{list_input_devices, save, AudioContext, CpalSource, Recorder, RecordingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "micbatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("micbatch v{}", env!("CARGO_PKG_VERSION"));

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config = RecordingConfig::from_env().context("invalid configuration")?;
    tracing::debug!("Config: {:?}", config);

    let context = AudioContext::resolve().context("cannot resolve default microphone")?;
    tracing::info!("Input devices: {:?}", list_input_devices());

    let recorder = Recorder::new(CpalSource::new(context), config.clone());
    let buffer = recorder
        .record_default()
        .with_context(|| format!("recording {}s failed", config.record_secs))?;

    save(&buffer, &config.output_file, config.encoding)
        .with_context(|| format!("cannot save {}", config.output_file.display()))?;

    println!(
        "Recorded {:.1}s ({} samples @ {}Hz) to {}",
        buffer.duration().as_secs_f64(),
        buffer.len(),
        buffer.sample_rate(),
        config.output_file.display()
    );

    Ok(())
}
