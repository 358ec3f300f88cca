//! Voice profiles and where they come from.
//!
//! A voice is a directory of reference clips. Three ways of finding voices
//! share the [`VoiceSource`] trait:
//!
//! * [`FixedVoices`]: a fixed name → directory map,
//! * [`VoiceStore`]: every sub-directory of a base directory is a voice,
//! * uploads, via [`VoiceStore::add_voice`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{audio::wav_info, config::Config, error::VoiceError};

/// A named voice and the directory holding its reference clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: String,
    pub dir: PathBuf,
}

impl VoiceProfile {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), dir: dir.into() }
    }

    /// `*.wav` files directly inside the voice directory, sorted by name.
    pub fn reference_files(&self) -> Result<Vec<PathBuf>, VoiceError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|source| VoiceError::Io { path: self.dir.clone(), source })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| VoiceError::Io { path: self.dir.clone(), source })?;
            let path = entry.path();
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if is_wav && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Verify the directory holds `expected` readable WAV clips.
    pub fn check(&self, expected: usize) -> Result<(), VoiceError> {
        let files = self.reference_files()?;
        if files.len() != expected {
            return Err(VoiceError::WrongClipCount { expected, actual: files.len() });
        }
        for (index, path) in files.iter().enumerate() {
            wav_info(path).map_err(|e| VoiceError::BadClip { index, reason: e.to_string() })?;
        }
        Ok(())
    }
}

/// Lists voices and resolves a name to a [`VoiceProfile`].
pub trait VoiceSource: Send + Sync {
    /// Voice names, sorted.
    fn list(&self) -> Result<Vec<String>, VoiceError>;

    fn resolve(&self, name: &str) -> Result<VoiceProfile, VoiceError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed map
// ─────────────────────────────────────────────────────────────────────────────

/// Voices from a fixed name → directory map.
#[derive(Debug, Clone, Default)]
pub struct FixedVoices {
    voices: BTreeMap<String, PathBuf>,
}

impl FixedVoices {
    pub fn new(voices: BTreeMap<String, PathBuf>) -> Self {
        Self { voices }
    }
}

impl VoiceSource for FixedVoices {
    fn list(&self) -> Result<Vec<String>, VoiceError> {
        Ok(self.voices.keys().cloned().collect())
    }

    fn resolve(&self, name: &str) -> Result<VoiceProfile, VoiceError> {
        self.voices
            .get(name)
            .map(|dir| VoiceProfile::new(name, dir))
            .ok_or_else(|| VoiceError::NotFound {
                name: name.to_string(),
                available: self.list().unwrap_or_default(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory store
// ─────────────────────────────────────────────────────────────────────────────

/// Voices stored as sub-directories of one base directory.
#[derive(Debug, Clone)]
pub struct VoiceStore {
    base: PathBuf,
    reference_clips: usize,
}

impl VoiceStore {
    /// `reference_clips` is how many clips [`add_voice`](Self::add_voice) requires.
    pub fn new(base: impl Into<PathBuf>, reference_clips: usize) -> Self {
        Self { base: base.into(), reference_clips }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Store uploaded clips as `<base>/<name>/0.wav`, `1.wav`, ….
    ///
    /// Each clip must be the bytes of a WAV file. Existing files with the
    /// same names are overwritten.
    pub fn add_voice(&self, name: &str, clips: &[Vec<u8>]) -> Result<VoiceProfile, VoiceError> {
        validate_name(name)?;
        if clips.len() != self.reference_clips {
            return Err(VoiceError::WrongClipCount {
                expected: self.reference_clips,
                actual: clips.len(),
            });
        }
        for (index, clip) in clips.iter().enumerate() {
            hound::WavReader::new(std::io::Cursor::new(clip))
                .map_err(|e| VoiceError::BadClip { index, reason: e.to_string() })?;
        }

        let dir = self.base.join(name);
        fs::create_dir_all(&dir).map_err(|source| VoiceError::Io { path: dir.clone(), source })?;
        for (index, clip) in clips.iter().enumerate() {
            let path = dir.join(format!("{index}.wav"));
            fs::write(&path, clip).map_err(|source| VoiceError::Io { path, source })?;
        }

        tracing::info!(voice = name, dir = %dir.display(), clips = clips.len(), "voice added");
        Ok(VoiceProfile::new(name, dir))
    }
}

impl VoiceSource for VoiceStore {
    fn list(&self) -> Result<Vec<String>, VoiceError> {
        if !self.base.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.base)
            .map_err(|source| VoiceError::Io { path: self.base.clone(), source })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| VoiceError::Io { path: self.base.clone(), source })?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn resolve(&self, name: &str) -> Result<VoiceProfile, VoiceError> {
        validate_name(name)?;
        let dir = self.base.join(name);
        if !dir.is_dir() {
            return Err(VoiceError::NotFound { name: name.to_string(), available: self.list()? });
        }
        Ok(VoiceProfile::new(name, dir))
    }
}

/// The voice source a config describes: the fixed map when one is given,
/// otherwise a scan of `voices_dir`.
pub fn source_from_config(config: &Config) -> Box<dyn VoiceSource> {
    if config.fixed_voices.is_empty() {
        Box::new(VoiceStore::new(&config.voices_dir, config.reference_clips))
    } else {
        Box::new(FixedVoices::new(config.fixed_voices.clone()))
    }
}

/// Voice names become directory names: no separators, no `..`, not blank.
fn validate_name(name: &str) -> Result<(), VoiceError> {
    let bad = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == ".."
        || name.contains('\0');
    if bad {
        return Err(VoiceError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{write_wav, Waveform, SAMPLE_RATE};
    use tempfile::tempdir;

    fn wav_bytes(len: usize) -> Vec<u8> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &Waveform::new(vec![0.2; len], SAMPLE_RATE)).unwrap();
        fs::read(path).unwrap()
    }

    #[test]
    fn add_voice_stores_numbered_clips() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::new(dir.path(), 2);
        let profile = store.add_voice("martin", &[wav_bytes(10), wav_bytes(20)]).unwrap();

        assert_eq!(profile.name, "martin");
        let files = profile.reference_files().unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["0.wav", "1.wav"]);
        assert!(profile.check(2).is_ok());
    }

    #[test]
    fn add_voice_requires_exact_clip_count() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::new(dir.path(), 2);
        let err = store.add_voice("martin", &[wav_bytes(10)]).unwrap_err();
        assert!(matches!(err, VoiceError::WrongClipCount { expected: 2, actual: 1 }));
        assert!(!dir.path().join("martin").exists());
    }

    #[test]
    fn add_voice_rejects_non_wav_bytes() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::new(dir.path(), 2);
        let err = store.add_voice("martin", &[wav_bytes(10), b"not a wav".to_vec()]).unwrap_err();
        assert!(matches!(err, VoiceError::BadClip { index: 1, .. }));
    }

    #[test]
    fn names_that_escape_the_store_are_rejected() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::new(dir.path(), 1);
        for name in ["", "  ", "..", "a/b", "a\\b"] {
            let result = store.add_voice(name, &[wav_bytes(1)]);
            assert!(matches!(result, Err(VoiceError::InvalidName(_))), "{name:?}");
        }
    }

    #[test]
    fn store_lists_directories_sorted() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("zoe")).unwrap();
        fs::create_dir(dir.path().join("Voz 1")).unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        let store = VoiceStore::new(dir.path(), 2);
        assert_eq!(store.list().unwrap(), vec!["Voz 1", "zoe"]);
    }

    #[test]
    fn missing_base_lists_nothing() {
        let store = VoiceStore::new("/nonexistent/voices", 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn resolve_unknown_voice_lists_available() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("miley")).unwrap();
        let store = VoiceStore::new(dir.path(), 2);

        match store.resolve("martin") {
            Err(VoiceError::NotFound { name, available }) => {
                assert_eq!(name, "martin");
                assert_eq!(available, vec!["miley"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(store.resolve("miley").unwrap().dir, dir.path().join("miley"));
    }

    #[test]
    fn fixed_voices_resolve_from_map() {
        let mut map = BTreeMap::new();
        map.insert("Voz 1".to_string(), PathBuf::from("/voices/voz1"));
        let fixed = FixedVoices::new(map);

        assert_eq!(fixed.list().unwrap(), vec!["Voz 1"]);
        assert_eq!(fixed.resolve("Voz 1").unwrap().dir, PathBuf::from("/voices/voz1"));
        assert!(matches!(fixed.resolve("Voz 2"), Err(VoiceError::NotFound { .. })));
    }

    #[test]
    fn config_picks_fixed_map_over_scan() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("scanned")).unwrap();
        let mut config = Config { voices_dir: dir.path().to_path_buf(), ..Config::default() };
        assert_eq!(source_from_config(&config).list().unwrap(), vec!["scanned"]);

        config.fixed_voices.insert("Voz 1".into(), PathBuf::from("/voices/voz1"));
        assert_eq!(source_from_config(&config).list().unwrap(), vec!["Voz 1"]);
    }

    #[test]
    fn check_reports_missing_clips() {
        let dir = tempdir().unwrap();
        let profile = VoiceProfile::new("empty", dir.path());
        assert!(matches!(
            profile.check(2),
            Err(VoiceError::WrongClipCount { expected: 2, actual: 0 })
        ));
    }
}
