//! Per-session audio capture
//!
//! Inbound PCM is optionally mirrored to a WAV file on disk, one file per
//! session tag. Capture failures degrade the session to no-capture; they
//! never interrupt relaying.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Writes a session's inbound PCM to a mono 16-bit WAV file
pub struct CaptureWriter {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl CaptureWriter {
    pub fn create(dir: &Path, tag: &str, sample_rate: u32) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create capture directory {}", dir.display()))?;

        let path = dir.join(format!("{}.wav", tag));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create capture file {}", path.display()))?;

        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a chunk of 16-bit little-endian PCM
    pub fn write(&mut self, pcm: &[u8]) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            for sample in pcm.chunks_exact(2) {
                writer
                    .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                    .context("Failed to write capture sample")?;
            }
        }
        Ok(())
    }

    /// Finish the WAV header and return the capture path
    pub fn finalize(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize capture file")?;
        }
        Ok(self.path.clone())
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize capture file on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_capture_roundtrip() {
        let dir = tempdir().unwrap();

        let samples: Vec<i16> = vec![100, -200, 300, -400];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut capture = CaptureWriter::create(dir.path(), "session-test", 16000).unwrap();
        capture.write(&pcm).unwrap();
        let path = capture.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_capture_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("captures");

        let capture = CaptureWriter::create(&nested, "session-test", 16000).unwrap();
        assert!(nested.exists());
        assert!(capture.path().ends_with("session-test.wav"));
    }
}
