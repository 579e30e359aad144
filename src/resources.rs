//! Loading of the static resources a recognizer is built from.

use crate::error::{LatgenError, Result};
use crate::features::TransformMatrix;
use crate::graph::{DecodeGraph, SymbolTable};
use crate::model::AcousticModel;
use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

/// Source of setup-time resources.
///
/// This trait allows swapping implementations (files on disk vs in-memory fixtures).
pub trait ResourceLoader {
    fn load_model(&self, path: &Path) -> Result<Arc<AcousticModel>>;
    fn load_graph(&self, path: &Path) -> Result<Arc<DecodeGraph>>;
    fn load_symbols(&self, path: &Path) -> Result<SymbolTable>;
    fn load_transform(&self, path: &Path) -> Result<TransformMatrix>;
}

/// Reads every resource from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl ResourceLoader for FileLoader {
    fn load_model(&self, path: &Path) -> Result<Arc<AcousticModel>> {
        AcousticModel::load(path).map(Arc::new)
    }

    fn load_graph(&self, path: &Path) -> Result<Arc<DecodeGraph>> {
        DecodeGraph::load(path).map(Arc::new)
    }

    fn load_symbols(&self, path: &Path) -> Result<SymbolTable> {
        SymbolTable::load(path)
    }

    fn load_transform(&self, path: &Path) -> Result<TransformMatrix> {
        TransformMatrix::load(path)
    }
}

/// Mock loader serving in-memory resources, for testing
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    model: Option<Arc<AcousticModel>>,
    graph: Option<Arc<DecodeGraph>>,
    symbols: Option<SymbolTable>,
    transform: Option<TransformMatrix>,
    should_fail_transform: bool,
    loads: Cell<usize>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Arc<AcousticModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_graph(mut self, graph: Arc<DecodeGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn with_transform(mut self, transform: TransformMatrix) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Report the transform file as malformed.
    pub fn with_transform_failure(mut self) -> Self {
        self.should_fail_transform = true;
        self
    }

    /// Number of load calls made so far, successful or not.
    pub fn loads(&self) -> usize {
        self.loads.get()
    }

    fn count(&self) {
        self.loads.set(self.loads.get() + 1);
    }
}

fn missing(path: &Path) -> String {
    format!("no fixture provided for {}", path.display())
}

impl ResourceLoader for MockLoader {
    fn load_model(&self, path: &Path) -> Result<Arc<AcousticModel>> {
        self.count();
        self.model.clone().ok_or_else(|| LatgenError::ModelLoad {
            path: path.display().to_string(),
            message: missing(path),
        })
    }

    fn load_graph(&self, path: &Path) -> Result<Arc<DecodeGraph>> {
        self.count();
        self.graph.clone().ok_or_else(|| LatgenError::GraphLoad {
            path: path.display().to_string(),
            message: missing(path),
        })
    }

    fn load_symbols(&self, path: &Path) -> Result<SymbolTable> {
        self.count();
        self.symbols
            .clone()
            .ok_or_else(|| LatgenError::SymbolTableLoad {
                path: path.display().to_string(),
                message: missing(path),
            })
    }

    fn load_transform(&self, path: &Path) -> Result<TransformMatrix> {
        self.count();
        let err = |message: String| LatgenError::TransformLoad {
            path: path.display().to_string(),
            message,
        };
        if self.should_fail_transform {
            return Err(err("malformed matrix".to_string()));
        }
        self.transform.clone().ok_or_else(|| err(missing(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn file_loader_reads_graph_and_symbols() {
        let mut graph = NamedTempFile::new().unwrap();
        graph.write_all(b"0 1 1 1\n1\n").unwrap();
        let mut words = NamedTempFile::new().unwrap();
        words.write_all(b"<eps> 0\nyes 1\n").unwrap();

        let loader = FileLoader;
        assert_eq!(loader.load_graph(graph.path()).unwrap().num_arcs(), 1);
        assert_eq!(loader.load_symbols(words.path()).unwrap().word(1), Some("yes"));
    }

    #[test]
    fn file_loader_errors_are_setup_errors() {
        let loader = FileLoader;
        let missing = Path::new("/nonexistent/resource");
        for err in [
            loader.load_model(missing).unwrap_err(),
            loader.load_graph(missing).unwrap_err(),
            loader.load_symbols(missing).unwrap_err(),
            loader.load_transform(missing).unwrap_err(),
        ] {
            assert_eq!(err.exit_code(), 2, "{err}");
        }
    }

    #[test]
    fn mock_loader_counts_and_fails_on_request() {
        let loader = MockLoader::new().with_transform_failure();
        assert!(loader.load_model(Path::new("m")).is_err());
        let err = loader.load_transform(Path::new("t")).unwrap_err();
        assert!(matches!(err, LatgenError::TransformLoad { .. }));
        assert_eq!(loader.loads(), 2);
    }

    #[test]
    fn mock_loader_shares_the_same_graph() {
        let graph = Arc::new(DecodeGraph::parse("0 1 1 1\n1\n").unwrap());
        let loader = MockLoader::new().with_graph(Arc::clone(&graph));
        let loaded = loader.load_graph(Path::new("g")).unwrap();
        assert!(Arc::ptr_eq(&graph, &loaded));
    }
}
