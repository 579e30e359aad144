//! Acoustic model: transition table plus one diagonal GMM per pdf.
//!
//! The on-disk form is JSON:
//!
//! ```json
//! {
//!   "transitions": [ { "pdf": 0, "phone": 1 }, ... ],
//!   "pdfs": [ { "weights": [..], "means": [[..]], "variances": [[..]] }, ... ]
//! }
//! ```
//!
//! `transitions[i]` describes transition id `i + 1`.

pub mod gmm;
pub mod transition;

pub use gmm::{DiagGmm, DiagGmmParams};
pub use transition::{TransitionEntry, TransitionModel};

use crate::error::{LatgenError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    transitions: TransitionModel,
    pdfs: Vec<DiagGmmParams>,
}

/// Loaded, validated acoustic model.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticModel {
    transitions: TransitionModel,
    pdfs: Vec<DiagGmm>,
    dim: usize,
}

impl AcousticModel {
    /// Build a model from its parts, checking that every transition points
    /// at an existing pdf and that all pdfs share one dimension.
    pub fn new(
        transitions: TransitionModel,
        pdfs: Vec<DiagGmm>,
    ) -> std::result::Result<Self, String> {
        let dim = pdfs.first().map(DiagGmm::dim).ok_or("model has no pdfs")?;
        if let Some((i, _)) = pdfs.iter().enumerate().find(|(_, p)| p.dim() != dim) {
            return Err(format!("pdf {} has dimension {}, expected {}", i, pdfs[i].dim(), dim));
        }
        if transitions.num_transition_ids() == 0 {
            return Err("model has no transitions".to_string());
        }
        if let Some(max_pdf) = transitions.max_pdf()
            && max_pdf >= pdfs.len()
        {
            return Err(format!(
                "transition refers to pdf {} but only {} pdfs exist",
                max_pdf,
                pdfs.len()
            ));
        }
        Ok(Self {
            transitions,
            pdfs,
            dim,
        })
    }

    /// Parse the JSON model format.
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        let file: ModelFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let pdfs = file
            .pdfs
            .into_iter()
            .enumerate()
            .map(|(i, params)| DiagGmm::new(params).map_err(|e| format!("pdf {}: {}", i, e)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(file.transitions, pdfs)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |message: String| LatgenError::ModelLoad {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Self::from_json(&text).map_err(load_err)
    }

    /// Feature dimension the pdfs expect.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_pdfs(&self) -> usize {
        self.pdfs.len()
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    /// Log-likelihood of `features` under pdf `pdf`.
    pub fn log_likelihood(&self, pdf: usize, features: &[f32]) -> Option<f32> {
        self.pdfs.get(pdf).map(|gmm| gmm.log_likelihood(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TWO_PDFS: &str = r#"{
        "transitions": [ {"pdf": 0, "phone": 1}, {"pdf": 1, "phone": 2}, {"pdf": 1, "phone": 2} ],
        "pdfs": [
            {"weights": [1.0], "means": [[0.0, 0.0]], "variances": [[1.0, 1.0]]},
            {"weights": [0.5, 0.5], "means": [[1.0, 1.0], [2.0, 2.0]], "variances": [[1.0, 1.0], [1.0, 1.0]]}
        ]
    }"#;

    #[test]
    fn parses_json_model() {
        let model = AcousticModel::from_json(TWO_PDFS).unwrap();
        assert_eq!(model.dim(), 2);
        assert_eq!(model.num_pdfs(), 2);
        assert_eq!(model.transitions().num_transition_ids(), 3);
        assert_eq!(model.transitions().pdf(3), Some(1));
    }

    #[test]
    fn scores_through_selected_pdf() {
        let model = AcousticModel::from_json(TWO_PDFS).unwrap();
        let origin = [0.0, 0.0];
        let near_zero = model.log_likelihood(0, &origin).unwrap();
        let near_one = model.log_likelihood(1, &origin).unwrap();
        assert!(near_zero > near_one);
        assert_eq!(model.log_likelihood(2, &origin), None);
    }

    #[test]
    fn rejects_transition_to_missing_pdf() {
        let text = r#"{
            "transitions": [ {"pdf": 4, "phone": 1} ],
            "pdfs": [ {"weights": [1.0], "means": [[0.0]], "variances": [[1.0]]} ]
        }"#;
        let err = AcousticModel::from_json(text).unwrap_err();
        assert!(err.contains("pdf 4"), "{err}");
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let text = r#"{
            "transitions": [ {"pdf": 0, "phone": 1} ],
            "pdfs": [
                {"weights": [1.0], "means": [[0.0]], "variances": [[1.0]]},
                {"weights": [1.0], "means": [[0.0, 1.0]], "variances": [[1.0, 1.0]]}
            ]
        }"#;
        assert!(AcousticModel::from_json(text).is_err());
    }

    #[test]
    fn load_reports_model_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = AcousticModel::load(file.path()).unwrap_err();
        assert!(matches!(err, LatgenError::ModelLoad { .. }));
        assert_eq!(err.exit_code(), 2);

        let err = AcousticModel::load(Path::new("/nonexistent/final.mdl")).unwrap_err();
        assert!(matches!(err, LatgenError::ModelLoad { .. }));
    }

    #[test]
    fn load_reads_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TWO_PDFS.as_bytes()).unwrap();
        assert_eq!(AcousticModel::load(file.path()).unwrap().num_pdfs(), 2);
    }
}
