use crate::defaults;
use crate::error::{LatgenError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub mfcc: MfccConfig,
    pub features: FeatureConfig,
    pub decoder: DecoderConfig,
}

/// Audio framing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_length_ms: u32,
    pub frame_shift_ms: u32,
}

/// Cepstral feature configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MfccConfig {
    pub num_ceps: usize,
    pub num_mel_bins: usize,
    pub low_freq: f32,
    pub high_freq: f32,
    pub preemphasis_coeff: f32,
    pub cepstral_lifter: f32,
}

/// Feature transform configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub delta_order: usize,
    pub left_context: usize,
    pub right_context: usize,
}

/// Graph search configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    pub beam: f32,
    pub max_active: usize,
    pub min_active: usize,
    pub lattice_beam: f32,
    pub prune_interval: usize,
    pub acoustic_scale: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_length_ms: defaults::FRAME_LENGTH_MS,
            frame_shift_ms: defaults::FRAME_SHIFT_MS,
        }
    }
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            num_ceps: defaults::NUM_CEPS,
            num_mel_bins: defaults::NUM_MEL_BINS,
            low_freq: defaults::LOW_FREQ,
            high_freq: defaults::HIGH_FREQ,
            preemphasis_coeff: defaults::PREEMPHASIS_COEFF,
            cepstral_lifter: defaults::CEPSTRAL_LIFTER,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            delta_order: defaults::DELTA_ORDER,
            left_context: defaults::LEFT_CONTEXT,
            right_context: defaults::RIGHT_CONTEXT,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam: defaults::BEAM,
            max_active: defaults::MAX_ACTIVE,
            min_active: defaults::MIN_ACTIVE,
            lattice_beam: defaults::LATTICE_BEAM,
            prune_interval: defaults::PRUNE_INTERVAL,
            acoustic_scale: defaults::ACOUSTIC_SCALE,
        }
    }
}

impl AudioConfig {
    /// Window length in samples.
    pub fn frame_length_samples(&self) -> usize {
        defaults::ms_to_samples(self.frame_length_ms, self.sample_rate)
    }

    /// Window shift in samples.
    pub fn frame_shift_samples(&self) -> usize {
        defaults::ms_to_samples(self.frame_shift_ms, self.sample_rate)
    }
}

impl FeatureConfig {
    /// Regression half-width used by each differencing order.
    pub fn delta_window(&self) -> usize {
        if self.delta_order == 0 {
            0
        } else {
            self.left_context / self.delta_order
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> LatgenError {
    LatgenError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LatgenError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LatgenError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(LatgenError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LATGEN_ACOUSTIC_SCALE → decoder.acoustic_scale
    /// - LATGEN_BEAM → decoder.beam
    /// - LATGEN_MAX_ACTIVE → decoder.max_active
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(scale) = std::env::var("LATGEN_ACOUSTIC_SCALE")
            && let Ok(scale) = scale.trim().parse::<f32>()
        {
            self.decoder.acoustic_scale = scale;
        }

        if let Ok(beam) = std::env::var("LATGEN_BEAM")
            && let Ok(beam) = beam.trim().parse::<f32>()
        {
            self.decoder.beam = beam;
        }

        if let Ok(max_active) = std::env::var("LATGEN_MAX_ACTIVE")
            && let Ok(max_active) = max_active.trim().parse::<usize>()
        {
            self.decoder.max_active = max_active;
        }

        self
    }

    /// Check that the configuration is internally consistent.
    ///
    /// Runs before any file is opened. `has_transform` selects which
    /// context rules apply: without a projection matrix the context must be
    /// symmetric and a whole multiple of the differencing order.
    pub fn validate(&self, has_transform: bool) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if audio.frame_length_samples() == 0 {
            return Err(invalid(
                "audio.frame_length_ms",
                "must cover at least one sample",
            ));
        }
        if audio.frame_shift_samples() == 0 {
            return Err(invalid(
                "audio.frame_shift_ms",
                "must cover at least one sample",
            ));
        }
        if audio.frame_shift_ms > audio.frame_length_ms {
            return Err(invalid(
                "audio.frame_shift_ms",
                format!(
                    "shift {}ms exceeds frame length {}ms",
                    audio.frame_shift_ms, audio.frame_length_ms
                ),
            ));
        }

        let mfcc = &self.mfcc;
        if mfcc.num_ceps == 0 || mfcc.num_ceps > mfcc.num_mel_bins {
            return Err(invalid(
                "mfcc.num_ceps",
                format!("must be in 1..={}", mfcc.num_mel_bins),
            ));
        }

        let features = &self.features;
        if !has_transform {
            if features.delta_order == 0 {
                if features.left_context != 0 || features.right_context != 0 {
                    return Err(invalid(
                        "features.left_context",
                        "context requires a positive delta_order",
                    ));
                }
            } else if features.left_context % features.delta_order != 0 {
                return Err(invalid(
                    "features.left_context",
                    format!(
                        "{} is not divisible by delta_order {}",
                        features.left_context, features.delta_order
                    ),
                ));
            }
            if features.left_context != features.right_context {
                return Err(invalid(
                    "features.right_context",
                    format!(
                        "must equal left_context ({} != {})",
                        features.right_context, features.left_context
                    ),
                ));
            }
        }

        let decoder = &self.decoder;
        if decoder.beam.is_nan() || decoder.beam <= 0.0 {
            return Err(invalid("decoder.beam", "must be positive"));
        }
        if decoder.lattice_beam.is_nan() || decoder.lattice_beam <= 0.0 {
            return Err(invalid("decoder.lattice_beam", "must be positive"));
        }
        if decoder.max_active == 0 || decoder.max_active < decoder.min_active {
            return Err(invalid(
                "decoder.max_active",
                format!("must be at least min_active ({})", decoder.min_active),
            ));
        }
        if decoder.prune_interval == 0 {
            return Err(invalid("decoder.prune_interval", "must be positive"));
        }
        if !decoder.acoustic_scale.is_finite() || decoder.acoustic_scale < 0.0 {
            return Err(invalid(
                "decoder.acoustic_scale",
                "must be a finite, non-negative number",
            ));
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/latgen/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("latgen").join("config.toml"))
    }
}

/// Locations of the files a recognizer is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePaths {
    pub model: PathBuf,
    pub graph: PathBuf,
    pub word_symbols: PathBuf,
    pub silence_phones: Vec<i32>,
    pub transform: Option<PathBuf>,
}

impl ResourcePaths {
    /// Build from the positional arguments `<model> <fst> <words> <silence-phones> [transform]`.
    pub fn from_args(args: &[String]) -> Result<Self> {
        const NAMES: [&str; 4] = ["model", "fst", "word-symbol-table", "silence-phones"];
        if args.len() < NAMES.len() {
            return Err(LatgenError::MissingArgument {
                name: NAMES[args.len()].to_string(),
            });
        }
        if args.len() > NAMES.len() + 1 {
            return Err(LatgenError::ConfigInvalidValue {
                key: "arguments".to_string(),
                message: format!("expected 4 or 5 positional arguments, got {}", args.len()),
            });
        }

        Ok(Self {
            model: PathBuf::from(&args[0]),
            graph: PathBuf::from(&args[1]),
            word_symbols: PathBuf::from(&args[2]),
            silence_phones: parse_silence_phones(&args[3])?,
            transform: args
                .get(4)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Parse a colon-separated phone list such as `1:2:3:4:5`.
pub fn parse_silence_phones(list: &str) -> Result<Vec<i32>> {
    let list = list.trim();
    if list.is_empty() {
        return Ok(Vec::new());
    }
    list.split(':')
        .map(|phone| {
            phone
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| {
                    invalid(
                        "silence-phones",
                        format!("'{}' is not a positive phone id", phone),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_latgen_env() {
        remove_env("LATGEN_ACOUSTIC_SCALE");
        remove_env("LATGEN_BEAM");
        remove_env("LATGEN_MAX_ACTIVE");
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.frame_length_ms, 25);
        assert_eq!(config.audio.frame_shift_ms, 10);

        assert_eq!(config.mfcc.num_ceps, 13);
        assert_eq!(config.features.delta_order, 2);
        assert_eq!(config.features.left_context, 4);
        assert_eq!(config.features.right_context, 4);

        assert_eq!(config.decoder.beam, 16.0);
        assert_eq!(config.decoder.max_active, 7000);
        assert_eq!(config.decoder.acoustic_scale, 0.1);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate(false).is_ok());
        assert!(Config::default().validate(true).is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [audio]
            sample_rate = 8000
            frame_length_ms = 20

            [features]
            delta_order = 1
            left_context = 3
            right_context = 3

            [decoder]
            beam = 12.0
            max_active = 4000
            acoustic_scale = 0.0769
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.audio.frame_length_ms, 20);
        assert_eq!(config.audio.frame_shift_ms, 10);
        assert_eq!(config.features.delta_order, 1);
        assert_eq!(config.features.delta_window(), 3);
        assert_eq!(config.decoder.beam, 12.0);
        assert_eq!(config.decoder.max_active, 4000);
        assert_eq!(config.decoder.acoustic_scale, 0.0769);
        assert_eq!(config.mfcc, MfccConfig::default());
    }

    #[test]
    fn test_invalid_toml_returns_config_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[decoder\nbeam = ").unwrap();

        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_latgen_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[audio\nsample_rate = ").unwrap();
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_override_acoustic_scale() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_latgen_env();

        set_env("LATGEN_ACOUSTIC_SCALE", "0.0769");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.decoder.acoustic_scale, 0.0769);
        assert_eq!(config.decoder.beam, 16.0);

        clear_latgen_env();
    }

    #[test]
    fn test_env_override_unparsable_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_latgen_env();

        set_env("LATGEN_BEAM", "");
        set_env("LATGEN_MAX_ACTIVE", "lots");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.decoder.beam, 16.0);
        assert_eq!(config.decoder.max_active, 7000);

        clear_latgen_env();
    }

    #[test]
    fn test_validate_rejects_context_not_divisible_by_order() {
        let mut config = Config::default();
        config.features.left_context = 3;
        config.features.right_context = 3;

        let err = config.validate(false).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("left_context"));

        // A projection matrix lifts the restriction
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_rejects_asymmetric_context_without_transform() {
        let mut config = Config::default();
        config.features.right_context = 2;

        let err = config.validate(false).unwrap_err();
        assert!(err.to_string().contains("right_context"));
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_zero_order_requires_zero_context() {
        let mut config = Config::default();
        config.features.delta_order = 0;
        assert!(config.validate(false).is_err());

        config.features.left_context = 0;
        config.features.right_context = 0;
        assert!(config.validate(false).is_ok());
        assert_eq!(config.features.delta_window(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_decoder_values() {
        let mut config = Config::default();
        config.decoder.beam = 0.0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.decoder.max_active = 5;
        config.decoder.min_active = 10;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.decoder.acoustic_scale = -1.0;
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_validate_accepts_zero_acoustic_scale() {
        let mut config = Config::default();
        config.decoder.acoustic_scale = 0.0;
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_validate_rejects_shift_longer_than_window() {
        let mut config = Config::default();
        config.audio.frame_shift_ms = 30;
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_parse_silence_phones() {
        assert_eq!(parse_silence_phones("1:2:3:4:5").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_silence_phones("7").unwrap(), vec![7]);
        assert!(parse_silence_phones("").unwrap().is_empty());
        assert!(parse_silence_phones("1:x").unwrap_err().is_config_error());
        assert!(parse_silence_phones("1::2").is_err());
        assert!(parse_silence_phones("0").is_err());
    }

    #[test]
    fn test_resource_paths_four_args() {
        let paths =
            ResourcePaths::from_args(&args(&["model", "HCLG.fst", "words.txt", "1:2"])).unwrap();
        assert_eq!(paths.model, PathBuf::from("model"));
        assert_eq!(paths.graph, PathBuf::from("HCLG.fst"));
        assert_eq!(paths.word_symbols, PathBuf::from("words.txt"));
        assert_eq!(paths.silence_phones, vec![1, 2]);
        assert_eq!(paths.transform, None);
    }

    #[test]
    fn test_resource_paths_with_transform() {
        let paths = ResourcePaths::from_args(&args(&["m", "g", "w", "1", "final.mat"])).unwrap();
        assert_eq!(paths.transform, Some(PathBuf::from("final.mat")));
    }

    #[test]
    fn test_resource_paths_wrong_count() {
        let err = ResourcePaths::from_args(&args(&["m", "g"])).unwrap_err();
        assert!(matches!(err, LatgenError::MissingArgument { ref name } if name == "word-symbol-table"));
        assert_eq!(err.exit_code(), 1);

        let err = ResourcePaths::from_args(&args(&["m", "g", "w", "1", "t", "extra"])).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Some(path) = Config::default_path() {
            let path_str = path.to_string_lossy();
            assert!(path_str.contains("latgen"));
            assert!(path_str.ends_with("config.toml"));
        }
    }
}
