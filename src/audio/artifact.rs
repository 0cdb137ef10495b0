//! Temporary WAV files holding synthesized speech.

use crate::defaults;
use crate::error::{Result, VoxlateError};
use std::path::{Path, PathBuf};

const PREFIX: &str = "voxlate-";

/// Creates, reads and deletes uniquely named WAV artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Uses `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `$TMPDIR/voxlate-audio`
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join(defaults::ARTIFACT_DIR_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes 16-bit mono samples to a new file and returns its path.
    pub fn write(&self, samples: &[i16], sample_rate: u32) -> Result<PathBuf> {
        let path = self
            .dir
            .join(format!("{PREFIX}{}.wav", uuid::Uuid::new_v4()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let wav_err = |e: hound::Error| VoxlateError::Playback {
            message: format!("Failed to write {}: {}", path.display(), e),
        };
        let mut writer = hound::WavWriter::create(&path, spec).map_err(wav_err)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;

        log::debug!("wrote artifact {} ({} samples)", path.display(), samples.len());
        Ok(path)
    }

    /// Reads an artifact back as `(samples, sample_rate)`.
    #[cfg(test)]
    pub fn read(path: &Path) -> Result<(Vec<i16>, u32)> {
        let mut reader = hound::WavReader::open(path).map_err(|e| VoxlateError::Playback {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        let rate = reader.spec().sample_rate;
        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxlateError::Playback {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;
        Ok((samples, rate))
    }

    /// Deletes an artifact. A file that is already gone is not an error.
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::debug!("removed artifact {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Artifacts currently on disk in this store's directory.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PREFIX) && n.ends_with(".wav"));
            if is_artifact {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Deletes every artifact left in the directory (e.g. after a crash).
    pub fn sweep(&self) -> Result<usize> {
        let paths = self.list()?;
        for path in &paths {
            Self::remove(path)?;
        }
        Ok(paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let samples = vec![0i16, 1000, -1000, i16::MAX];
        let path = store.write(&samples, 16000).unwrap();
        assert!(path.exists());
        assert_eq!(path.parent().unwrap(), dir.path());

        let (read, rate) = ArtifactStore::read(&path).unwrap();
        assert_eq!(read, samples);
        assert_eq!(rate, 16000);

        ArtifactStore::remove(&path).unwrap();
        assert!(!path.exists());
        // Second removal is a no-op
        ArtifactStore::remove(&path).unwrap();
    }

    #[test]
    fn test_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let a = store.write(&[1], 16000).unwrap();
        let b = store.write(&[1], 16000).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = ArtifactStore::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn test_list_ignores_foreign_files_and_sweep_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        store.write(&[0; 10], 16000).unwrap();
        store.write(&[0; 10], 16000).unwrap();

        assert_eq!(store.sweep().unwrap(), 2);
        assert!(store.list().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_default_dir_under_temp() {
        let dir = ArtifactStore::default_dir();
        assert!(dir.starts_with(std::env::temp_dir()));
        assert!(dir.ends_with("voxlate-audio"));
    }
}
