//! Fixed linear (or affine) projection over spliced context frames.

use crate::error::{LatgenError, Result};
use std::path::Path;

/// Dense row-major matrix as read from a transform file.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TransformMatrix {
    /// Build from rows. All rows must have the same, non-zero length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> std::result::Result<Self, String> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || cols == 0 {
            return Err("matrix is empty".to_string());
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                cols
            ));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Parse the bracketed text form:
    ///
    /// ```text
    /// [ 1.0 0.0 0.5
    ///   0.0 1.0 0.5 ]
    /// ```
    ///
    /// Each line inside the brackets is one row.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        let body = text
            .strip_prefix('[')
            .ok_or("expected '[' at start of matrix")?;
        let body = body
            .trim_end()
            .strip_suffix(']')
            .ok_or("expected ']' at end of matrix")?;

        let mut rows = Vec::new();
        for (line_no, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f32>()
                        .map_err(|_| format!("line {}: invalid number '{}'", line_no + 1, tok))
                })
                .collect::<std::result::Result<Vec<f32>, String>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Read a matrix file.
    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |message: String| LatgenError::TransformLoad {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Self::parse(&text).map_err(load_err)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

/// Projection of `left + 1 + right` spliced frames through a matrix.
///
/// A matrix with one extra column is affine: its last column is added as
/// a bias.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProjection {
    matrix: TransformMatrix,
    left_context: usize,
    right_context: usize,
    affine: bool,
}

impl LinearProjection {
    /// Check the matrix against the spliced input size.
    pub fn new(
        matrix: TransformMatrix,
        left_context: usize,
        right_context: usize,
        input_dim: usize,
    ) -> Result<Self> {
        let spliced = (left_context + 1 + right_context) * input_dim;
        let affine = if matrix.cols() == spliced {
            false
        } else if matrix.cols() == spliced + 1 {
            true
        } else {
            return Err(LatgenError::DimensionMismatch {
                context: format!(
                    "feature transform columns ({} frames of {} features)",
                    left_context + 1 + right_context,
                    input_dim
                ),
                expected: spliced,
                actual: matrix.cols(),
            });
        };
        Ok(Self {
            matrix,
            left_context,
            right_context,
            affine,
        })
    }

    pub fn context(&self) -> (usize, usize) {
        (self.left_context, self.right_context)
    }

    pub fn output_dim(&self) -> usize {
        self.matrix.rows()
    }

    pub fn is_affine(&self) -> bool {
        self.affine
    }

    /// Project the spliced frames (oldest first).
    pub fn apply(&self, frames: &[&[f32]]) -> Vec<f32> {
        let spliced: Vec<f32> = frames.iter().flat_map(|f| f.iter().copied()).collect();
        (0..self.matrix.rows())
            .map(|r| {
                let row = self.matrix.row(r);
                let dot: f32 = row.iter().zip(&spliced).map(|(a, b)| a * b).sum();
                if self.affine {
                    dot + row[row.len() - 1]
                } else {
                    dot
                }
            })
            .collect()
    }
}
