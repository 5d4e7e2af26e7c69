//! Zero-phase Butterworth low-pass smoothing for the reconstructed
//! signal.
//!
//! The interpolated microphone signal carries high-frequency artifacts
//! from jittery timestamps and from the interpolation itself, so the
//! export pipeline runs it through a 4th-order Butterworth low-pass
//! before encoding. The filter is realized as two cascaded second-order
//! sections (biquads) for numerical stability, and each section is
//! applied forward and then backward over the buffer so the phase delay
//! of the two passes cancels and the output stays time-aligned with the
//! input.
//!
//! Coefficients are a pure function of the cutoff/order/rate triple;
//! there is no adaptive behavior.

use log::debug;

/// Filter order. Two biquad sections.
const ORDER: usize = 4;

/// One second-order IIR section in transposed direct form II, with the
/// denominator normalized so `a0 == 1`.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Low-pass section at `cutoff_hz` with quality factor `q`: the
    /// bilinear transform of the analog prototype `1 / (s^2 + s/Q + 1)`
    /// with the cutoff prewarped, which is how each factor of a digital
    /// Butterworth cascade is obtained.
    fn lowpass(cutoff_hz: f64, sample_rate_hz: u32, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate_hz as f64;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha;
        Biquad {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Runs the section once over `input`. The delay line starts in the
    /// steady state for a constant input equal to the first sample, so a
    /// signal that begins at rest produces no startup transient.
    fn run(&self, input: &[f64]) -> Vec<f64> {
        let Some(&first) = input.first() else {
            return Vec::new();
        };

        // Steady state for constant input c: y == c (unity DC gain), so
        // the transposed-form delays settle at these values.
        let mut w1 = first * (self.b1 - self.a1 + self.b2 - self.a2);
        let mut w2 = first * (self.b2 - self.a2);

        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + w1;
                w1 = self.b1 * x - self.a1 * y + w2;
                w2 = self.b2 * x - self.a2 * y;
                y
            })
            .collect()
    }

    /// Forward pass, then backward pass. The magnitude response applies
    /// twice and the phase response cancels.
    fn run_zero_phase(&self, input: &[f64]) -> Vec<f64> {
        let mut forward = self.run(input);
        forward.reverse();
        let mut backward = self.run(&forward);
        backward.reverse();
        backward
    }
}

/// The two Butterworth section quality factors for the given order: one
/// per conjugate pole pair of the analog prototype, `Q = 1/(2 sin θ)`
/// with `θ = (2k + 1)·π / (2·order)`.
fn butterworth_qs() -> [f64; ORDER / 2] {
    let mut qs = [0.0; ORDER / 2];
    for (k, q) in qs.iter_mut().enumerate() {
        let theta = (2 * k + 1) as f64 * std::f64::consts::PI / (2 * ORDER) as f64;
        *q = 1.0 / (2.0 * theta.sin());
    }
    qs
}

/// Applies a zero-phase 4th-order Butterworth low-pass at `cutoff_hz` to
/// a signal sampled at `sample_rate_hz`, re-quantizing to 16 bits by
/// truncation.
///
/// Two conditions bypass the filter and return the input unchanged
/// rather than failing: fewer than 2 samples (filtering is undefined),
/// and a cutoff at or above the Nyquist frequency (the cutoff is not
/// meaningful there).
pub fn lowpass(samples: &[i16], cutoff_hz: f64, sample_rate_hz: u32) -> Vec<i16> {
    if samples.len() < 2 {
        debug!("lowpass: {} sample(s), passing through", samples.len());
        return samples.to_vec();
    }

    let nyquist = sample_rate_hz as f64 / 2.0;
    if cutoff_hz >= nyquist {
        debug!(
            "lowpass: cutoff {} Hz at or above Nyquist {} Hz, passing through",
            cutoff_hz, nyquist
        );
        return samples.to_vec();
    }

    let mut signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
    for q in butterworth_qs() {
        let section = Biquad::lowpass(cutoff_hz, sample_rate_hz, q);
        signal = section.run_zero_phase(&signal);
    }

    signal
        .iter()
        .map(|&v| v.clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, rate_hz: u32, amplitude: f64, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / rate_hz as f64).sin() * amplitude)
            .map(|v| v as i16)
            .collect()
    }

    fn rms(samples: &[i16]) -> f64 {
        let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    #[test]
    fn short_input_is_bypassed() {
        assert_eq!(lowpass(&[], 3500.0, 8000), Vec::<i16>::new());
        assert_eq!(lowpass(&[1234], 3500.0, 8000), vec![1234]);
    }

    #[test]
    fn cutoff_at_or_above_nyquist_is_bypassed() {
        let input = sine(440.0, 8000, 10_000.0, 256);
        assert_eq!(lowpass(&input, 4000.0, 8000), input);
        assert_eq!(lowpass(&input, 9999.0, 8000), input);
    }

    #[test]
    fn constant_signal_is_preserved() {
        let input = vec![1000i16; 512];
        let output = lowpass(&input, 1000.0, 8000);
        // Unity DC gain, so the level must survive (truncation may cost
        // a count or two).
        assert!(output.iter().all(|&s| (s - 1000).abs() <= 2));
    }

    #[test]
    fn passband_tone_survives_nearly_unchanged() {
        let input = sine(100.0, 8000, 10_000.0, 8000);
        let output = lowpass(&input, 3500.0, 8000);

        let in_rms = rms(&input);
        let out_rms = rms(&output);
        assert!((out_rms / in_rms - 1.0).abs() < 0.05);

        // Zero phase: the output stays aligned with the input.
        let err: f64 = input
            .iter()
            .zip(&output)
            .map(|(&a, &b)| ((a - b) as f64).powi(2))
            .sum::<f64>();
        let err_rms = (err / input.len() as f64).sqrt();
        assert!(err_rms < 0.05 * in_rms);
    }

    #[test]
    fn stopband_tone_is_attenuated() {
        let input = sine(3500.0, 8000, 10_000.0, 8000);
        let output = lowpass(&input, 500.0, 8000);
        // 3500 Hz is nearly three octaves above the 500 Hz cutoff; an
        // order-4 filter applied twice should crush it.
        assert!(rms(&output) < 0.02 * rms(&input));
    }

    #[test]
    fn output_stays_in_sample_range() {
        let input = vec![i16::MAX; 1024];
        let output = lowpass(&input, 1000.0, 8000);
        assert!(output
            .iter()
            .all(|&s| (i16::MIN..=i16::MAX).contains(&s)));
    }

    #[test]
    fn filtering_is_deterministic() {
        let input = sine(700.0, 8000, 8_000.0, 2048);
        assert_eq!(lowpass(&input, 2000.0, 8000), lowpass(&input, 2000.0, 8000));
    }
}
