//! latgen - Streaming lattice-generating speech decoder
//!
//! Raw PCM goes in, cepstral features are computed incrementally, scored
//! against a GMM acoustic model and searched through a weighted decode
//! graph. Best paths and word lattices can be read back at any time.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod decoder;
pub mod defaults;
pub mod error;
pub mod features;
pub mod graph;
pub mod lattice;
pub mod model;
pub mod recognizer;
pub mod resources;
pub mod scorer;

// Top-level API
pub use recognizer::Recognizer;

// Seams (source -> score -> search)
pub use features::{ComputeFeatures, FramePoll, FrameSource};
pub use resources::{FileLoader, MockLoader, ResourceLoader};
pub use scorer::Decodable;

// Search results
pub use decoder::{BestPath, DecoderState, LatticeDecoder};
pub use lattice::{CompactLattice, Lattice, LatticeWeight};

// Error handling
pub use error::{LatgenError, Result};

// Config
pub use config::{Config, ResourcePaths};

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.0+abc1234"` when git hash is available, `"0.2.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_appends_hash_only_when_known() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
