//! WAV persistence
//!
//! Files are written to a temporary sibling and renamed into place once
//! finalized, so a failed write never leaves a truncated WAV behind.

use std::fmt;
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tempfile::{Builder, NamedTempFile};

use super::buffer::AudioBuffer;
use super::dsp::downmix_to_mono;
use super::error::AudioError;

/// Sample encoding of written WAV files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleEncoding {
    /// 16-bit integer PCM
    #[default]
    Pcm16,
    /// 32-bit IEEE float
    Float32,
}

impl SampleEncoding {
    fn spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            SampleEncoding::Pcm16 => (16, SampleFormat::Int),
            SampleEncoding::Float32 => (32, SampleFormat::Float),
        };

        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

impl FromStr for SampleEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pcm16" | "pcm_16" | "i16" => Ok(SampleEncoding::Pcm16),
            "float32" | "float" | "f32" => Ok(SampleEncoding::Float32),
            other => Err(format!("unknown encoding {:?}", other)),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleEncoding::Pcm16 => write!(f, "pcm16"),
            SampleEncoding::Float32 => write!(f, "float32"),
        }
    }
}

/// Write `buffer` to `path` as a mono WAV, replacing any existing file
pub fn save(
    buffer: &AudioBuffer,
    path: impl AsRef<Path>,
    encoding: SampleEncoding,
) -> Result<(), AudioError> {
    let path = path.as_ref();
    tracing::debug!("Saving audio file to {}...", path.display());

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // An overwritten file keeps its mode; a new one gets the usual umask-derived mode
    let existing = fs::metadata(path).ok().map(|m| m.permissions());

    // Dropping the temp file on an error path removes it
    let mut tmp = temp_file_in(dir).map_err(|e| AudioError::write(path, e))?;

    {
        let spec = encoding.spec(buffer.sample_rate());
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file_mut()), spec)
            .map_err(|e| AudioError::write(path, e))?;

        match encoding {
            SampleEncoding::Pcm16 => {
                for &sample in buffer.samples() {
                    writer
                        .write_sample(to_pcm16(sample))
                        .map_err(|e| AudioError::write(path, e))?;
                }
            }
            SampleEncoding::Float32 => {
                for &sample in buffer.samples() {
                    writer
                        .write_sample(sample)
                        .map_err(|e| AudioError::write(path, e))?;
                }
            }
        }

        writer.finalize().map_err(|e| AudioError::write(path, e))?;
    }

    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| AudioError::write(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| AudioError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| AudioError::write(path, e.error))?;

    tracing::info!(
        "Saved {} samples @ {}Hz ({}) to {}",
        buffer.len(),
        buffer.sample_rate(),
        encoding,
        path.display()
    );
    Ok(())
}

/// Read a WAV file back as a mono buffer
pub fn load(path: impl AsRef<Path>) -> Result<AudioBuffer, AudioError> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|e| AudioError::read(path, e))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::read(path, e))?,
        SampleFormat::Int => {
            let scale = int_full_scale(spec.bits_per_sample);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::read(path, e))?
        }
    };

    let samples = downmix_to_mono(&interleaved, spec.channels);
    tracing::debug!(
        "Loaded {} samples @ {}Hz from {}",
        samples.len(),
        spec.sample_rate,
        path.display()
    );

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(".micbatch-").suffix(".wav.tmp");

    // Created with 0666 so the umask applies, as for a plain File::create
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }

    builder.tempfile_in(dir)
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn int_full_scale(bits_per_sample: u16) -> f32 {
    ((1i64 << (bits_per_sample.clamp(1, 32) - 1)) - 1).max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PCM16_TOLERANCE: f32 = 1.0 / i16::MAX as f32;

    fn sine(len: usize, sample_rate: u32) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.8)
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn pcm16_round_trip_within_quantization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = sine(16000, 16000);

        save(&buffer, &path, SampleEncoding::Pcm16).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.len(), 16000);
        assert_eq!(loaded.sample_rate(), 16000);
        for (a, b) in buffer.samples().iter().zip(loaded.samples()) {
            assert!((a - b).abs() <= PCM16_TOLERANCE, "{} vs {}", a, b);
        }
    }

    #[test]
    fn float32_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let buffer = sine(4410, 44100);

        save(&buffer, &path, SampleEncoding::Float32).unwrap();
        assert_eq!(load(&path).unwrap(), buffer);
    }

    #[test]
    fn header_declares_mono_at_buffer_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.wav");

        save(&sine(100, 22050), &path, SampleEncoding::Pcm16).unwrap();
        let spec = WavReader::open(&path).unwrap().spec();

        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn saving_twice_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.wav");

        save(&sine(16000, 16000), &path, SampleEncoding::Pcm16).unwrap();
        save(&AudioBuffer::new(vec![0.5; 800], 16000), &path, SampleEncoding::Pcm16).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 800);
        assert!(loaded.samples().iter().all(|s| (s - 0.5).abs() <= PCM16_TOLERANCE));
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.wav");

        let err = save(&sine(10, 16000), &path, SampleEncoding::Pcm16).unwrap_err();

        assert!(matches!(err, AudioError::WriteError { .. }));
        assert!(!path.exists());
        assert!(!dir.path().join("nope").exists());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only.wav");

        save(&sine(10, 16000), &path, SampleEncoding::Pcm16).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn overwriting_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        for mode in [0o644, 0o640] {
            fs::write(&path, b"old").unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();

            save(&sine(100, 16000), &path, SampleEncoding::Pcm16).unwrap();

            let actual = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(actual, mode, "mode {:o} became {:o}", mode, actual);
            assert_eq!(load(&path).unwrap().len(), 100);
        }
    }

    #[cfg(unix)]
    #[test]
    fn new_files_follow_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.wav");

        save(&sine(10, 16000), &path, SampleEncoding::Pcm16).unwrap();

        // Same mode a plain create gets under the current umask
        let reference = dir.path().join("reference");
        fs::File::create(&reference).unwrap();
        let expected = fs::metadata(&reference).unwrap().permissions().mode() & 0o777;
        let actual = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(actual, expected);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        assert_eq!(to_pcm16(1.5), i16::MAX);
        assert_eq!(to_pcm16(-3.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn stereo_files_load_as_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(1.0f32).unwrap();
            writer.write_sample(0.0f32).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 100);
        assert!(loaded.samples().iter().all(|&s| s == 0.5));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.wav")).unwrap_err();
        assert!(matches!(err, AudioError::ReadError { .. }));
    }

    #[test]
    fn encoding_names_parse() {
        assert_eq!("PCM16".parse::<SampleEncoding>(), Ok(SampleEncoding::Pcm16));
        assert_eq!("f32".parse::<SampleEncoding>(), Ok(SampleEncoding::Float32));
        assert!("ogg".parse::<SampleEncoding>().is_err());
    }
}
