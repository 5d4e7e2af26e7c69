//! Turns an irregular sensor series into a uniform-rate signal, and
//! applies the scalar gain stage.
//!
//! The device timestamps every sample, but transmission hiccups, dropped
//! packets, and clock jitter leave the stored series unevenly spaced. A
//! WAV file needs samples spaced at exactly `1/rate` seconds, so the
//! series is linearly interpolated onto a synthetic uniform time axis
//! spanning `[t_first, t_last]` before encoding.

use crate::series::SampleSeries;

/// Resamples `series` to a uniform `target_rate_hz` signal of quantized
/// 16-bit samples.
///
/// Degenerate inputs resolve to defined fallbacks rather than errors, in
/// this order:
///
/// - no readings: empty signal;
/// - one reading: a single-sample signal holding that value;
/// - zero time span (all timestamps identical): the original values,
///   unresampled;
/// - fewer than 2 samples would fit in the span at the target rate: the
///   original values, unresampled (no interpolation domain exists).
///
/// Otherwise the output holds `floor(span_secs * rate)` samples, evenly
/// spaced with both endpoints included, each linearly interpolated from
/// the bracketing original points. The new axis is bounded by the
/// original one, so no extrapolation occurs. Interpolated values are
/// quantized by truncation toward zero.
pub fn resample(series: &SampleSeries, target_rate_hz: u32) -> Vec<i16> {
    let points = series.points();

    if points.is_empty() {
        return Vec::new();
    }
    if points.len() == 1 {
        return vec![points[0].1];
    }

    let times_secs: Vec<f64> = points.iter().map(|&(t, _)| t as f64 / 1_000_000.0).collect();
    let values: Vec<f64> = points.iter().map(|&(_, v)| v as f64).collect();

    let t_first = times_secs[0];
    let t_last = times_secs[times_secs.len() - 1];
    let span = t_last - t_first;

    if span == 0.0 {
        return points.iter().map(|&(_, v)| v).collect();
    }

    let num_samples = (span * target_rate_hz as f64) as usize;
    if num_samples < 2 {
        return points.iter().map(|&(_, v)| v).collect();
    }

    let step = span / (num_samples - 1) as f64;
    let mut out = Vec::with_capacity(num_samples);

    // The query axis is increasing, so the bracketing segment only ever
    // moves forward.
    let mut seg = 0;
    for i in 0..num_samples {
        let t = if i == num_samples - 1 {
            t_last
        } else {
            t_first + i as f64 * step
        };

        while seg + 2 < times_secs.len() && times_secs[seg + 1] <= t {
            seg += 1;
        }

        let (t0, t1) = (times_secs[seg], times_secs[seg + 1]);
        let (v0, v1) = (values[seg], values[seg + 1]);

        let v = if t1 <= t0 {
            // Tied timestamps within the bracketing pair; no slope exists.
            v0
        } else {
            v0 + (v1 - v0) * (t - t0) / (t1 - t0)
        };

        out.push(v as i16);
    }

    out
}

/// Multiplies every sample by `factor`, clips the result to the 16-bit
/// range, and truncates back to integers. A factor of 1.0 leaves values
/// untouched apart from the (vacuous) clip pass.
pub fn apply_gain(samples: &[i16], factor: f64) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s as f64 * factor).clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect()
}
