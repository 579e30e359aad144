//! Mel-frequency cepstral coefficients.
//!
//! One analysis window in, one cepstral vector out. The pipeline only sees
//! the [`ComputeFeatures`] trait, so any other per-window front end can be
//! dropped in without touching buffering or transforms.

use crate::config::{AudioConfig, MfccConfig};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Converts one window of samples into a feature vector.
pub trait ComputeFeatures {
    /// Length of the produced vector.
    fn dim(&self) -> usize;

    /// Compute features for `window`, whose length is the configured frame length.
    fn compute(&mut self, window: &[f32]) -> Vec<f32>;
}

/// Parameters for [`MfccComputer`].
#[derive(Debug, Clone, PartialEq)]
pub struct MfccOptions {
    pub sample_rate: u32,
    pub frame_length: usize,
    pub num_ceps: usize,
    pub num_mel_bins: usize,
    pub low_freq: f32,
    pub high_freq: f32,
    pub preemphasis_coeff: f32,
    pub cepstral_lifter: f32,
}

impl MfccOptions {
    pub fn from_config(audio: &AudioConfig, mfcc: &MfccConfig) -> Self {
        Self {
            sample_rate: audio.sample_rate,
            frame_length: audio.frame_length_samples(),
            num_ceps: mfcc.num_ceps,
            num_mel_bins: mfcc.num_mel_bins,
            low_freq: mfcc.low_freq,
            high_freq: mfcc.high_freq,
            preemphasis_coeff: mfcc.preemphasis_coeff,
            cepstral_lifter: mfcc.cepstral_lifter,
        }
    }
}

impl Default for MfccOptions {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default(), &MfccConfig::default())
    }
}

fn mel_scale(freq: f32) -> f32 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

/// Triangular filter: first FFT bin it touches and its weights.
struct MelBin {
    offset: usize,
    weights: Vec<f32>,
}

fn mel_banks(opts: &MfccOptions, fft_len: usize) -> Vec<MelBin> {
    let nyquist = opts.sample_rate as f32 / 2.0;
    let high = if opts.high_freq > 0.0 {
        opts.high_freq.min(nyquist)
    } else {
        nyquist + opts.high_freq
    };
    let low = opts.low_freq.clamp(0.0, high);
    let mel_low = mel_scale(low);
    let mel_delta = (mel_scale(high) - mel_low) / (opts.num_mel_bins + 1) as f32;
    let bin_hz = opts.sample_rate as f32 / fft_len as f32;
    let num_fft_bins = fft_len / 2 + 1;

    (0..opts.num_mel_bins)
        .map(|bin| {
            let left = mel_low + bin as f32 * mel_delta;
            let center = left + mel_delta;
            let right = center + mel_delta;

            let mut offset = None;
            let mut weights = Vec::new();
            for k in 0..num_fft_bins {
                let mel = mel_scale(k as f32 * bin_hz);
                if mel > left && mel < right {
                    let weight = if mel <= center {
                        (mel - left) / (center - left)
                    } else {
                        (right - mel) / (right - center)
                    };
                    offset.get_or_insert(k);
                    weights.push(weight);
                } else if offset.is_some() {
                    break;
                }
            }
            MelBin {
                offset: offset.unwrap_or(0),
                weights,
            }
        })
        .collect()
}

/// Hamming-windowed, pre-emphasized MFCC front end.
pub struct MfccComputer {
    opts: MfccOptions,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    banks: Vec<MelBin>,
    /// `num_ceps × num_mel_bins` DCT-II basis, row-major.
    dct: Vec<f32>,
    lifter: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl MfccComputer {
    pub fn new(opts: MfccOptions) -> Self {
        let frame_length = opts.frame_length.max(1);
        let fft_len = frame_length.next_power_of_two();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_len);

        let window = (0..frame_length)
            .map(|i| {
                if frame_length == 1 {
                    1.0
                } else {
                    0.54 - 0.46 * (2.0 * PI * i as f32 / (frame_length - 1) as f32).cos()
                }
            })
            .collect();

        let banks = mel_banks(&opts, fft_len);

        let num_bins = opts.num_mel_bins;
        let mut dct = Vec::with_capacity(opts.num_ceps * num_bins);
        for i in 0..opts.num_ceps {
            let norm = if i == 0 {
                (1.0 / num_bins as f32).sqrt()
            } else {
                (2.0 / num_bins as f32).sqrt()
            };
            for j in 0..num_bins {
                dct.push(norm * (PI * i as f32 * (j as f32 + 0.5) / num_bins as f32).cos());
            }
        }

        let lifter = (0..opts.num_ceps)
            .map(|i| {
                if opts.cepstral_lifter > 0.0 {
                    1.0 + 0.5 * opts.cepstral_lifter * (PI * i as f32 / opts.cepstral_lifter).sin()
                } else {
                    1.0
                }
            })
            .collect();

        Self {
            opts,
            fft,
            window,
            banks,
            dct,
            lifter,
            scratch: vec![Complex::default(); fft_len],
        }
    }

    pub fn options(&self) -> &MfccOptions {
        &self.opts
    }
}

impl ComputeFeatures for MfccComputer {
    fn dim(&self) -> usize {
        self.opts.num_ceps
    }

    fn compute(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = self.window.len().min(samples.len());
        let mut frame: Vec<f32> = samples[..n].to_vec();

        // DC removal
        if n > 0 {
            let mean = frame.iter().sum::<f32>() / n as f32;
            frame.iter_mut().for_each(|s| *s -= mean);
        }

        let coeff = self.opts.preemphasis_coeff;
        if coeff != 0.0 && n > 0 {
            for i in (1..n).rev() {
                frame[i] -= coeff * frame[i - 1];
            }
            frame[0] -= coeff * frame[0];
        }

        for (slot, value) in self.scratch.iter_mut().enumerate() {
            *value = if slot < n {
                Complex::new(frame[slot] * self.window[slot], 0.0)
            } else {
                Complex::default()
            };
        }
        self.fft.process(&mut self.scratch);

        let log_energies: Vec<f32> = self
            .banks
            .iter()
            .map(|bank| {
                let energy: f32 = bank
                    .weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * self.scratch[bank.offset + k].norm_sqr())
                    .sum();
                energy.max(f32::EPSILON).ln()
            })
            .collect();

        let num_bins = log_energies.len();
        (0..self.opts.num_ceps)
            .map(|i| {
                let basis = &self.dct[i * num_bins..(i + 1) * num_bins];
                let c: f32 = basis.iter().zip(&log_energies).map(|(b, e)| b * e).sum();
                c * self.lifter[i]
            })
            .collect()
    }
}
