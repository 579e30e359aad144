//! Temporal differencing (delta and delta-delta features).

/// Appends regression-based time derivatives to each frame.
///
/// Order `k` is the regression of order `k - 1` over `±window` frames:
///
/// ```text
/// d[t] = Σ_{n=1..window} n · (x[t+n] − x[t−n]) / (2 · Σ_{n=1..window} n²)
/// ```
///
/// The output for one frame therefore depends on `order * window` frames
/// on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaFeatures {
    order: usize,
    window: usize,
}

impl DeltaFeatures {
    pub fn new(order: usize, window: usize) -> Self {
        Self { order, window }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Frames of context needed on each side.
    pub fn context(&self) -> usize {
        self.order * self.window
    }

    pub fn output_dim(&self, input_dim: usize) -> usize {
        input_dim * (self.order + 1)
    }

    /// Compute the output for the centre frame of `frames`.
    ///
    /// `frames` must hold exactly `2 * context() + 1` frames, already padded
    /// at the stream edges.
    pub fn apply(&self, frames: &[&[f32]]) -> Vec<f32> {
        let span = frames.len();
        debug_assert_eq!(span, 2 * self.context() + 1);
        let center = self.context();
        let dim = frames.first().map_or(0, |f| f.len());

        let mut output = Vec::with_capacity(self.output_dim(dim));
        output.extend_from_slice(frames[center]);

        if self.order == 0 || self.window == 0 {
            return output;
        }

        let norm: f32 = 2.0 * (1..=self.window).map(|n| (n * n) as f32).sum::<f32>();
        let w = self.window;

        // level[k][p] is order-k output at window position p, valid for
        // p in k*w ..= span-1-k*w.
        let mut previous: Vec<Vec<f32>> = frames.iter().map(|f| f.to_vec()).collect();
        for k in 1..=self.order {
            let lo = k * w;
            let hi = span - 1 - k * w;
            let mut current = vec![Vec::new(); span];
            for (p, slot) in current.iter_mut().enumerate().take(hi + 1).skip(lo) {
                let mut d = vec![0.0f32; dim];
                for n in 1..=w {
                    let ahead = &previous[p + n];
                    let behind = &previous[p - n];
                    for (j, value) in d.iter_mut().enumerate() {
                        *value += n as f32 * (ahead[j] - behind[j]);
                    }
                }
                d.iter_mut().for_each(|v| *v /= norm);
                *slot = d;
            }
            output.extend_from_slice(&current[center]);
            previous = current;
        }

        output
    }
}
