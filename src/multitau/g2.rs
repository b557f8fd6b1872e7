//! Multi-tau correlation arithmetic.
//!
//! Pure functions over one pixel's intensity series: level accounting,
//! in-place smoothing, and the pair-averaging loops for the standard,
//! kinetics slice-level and kinetics slice-overlap cases. A lag with no
//! contributing pair yields `None`; the engine suppresses the record
//! instead of emitting an undefined quotient.

/// Averages over the contributing pairs of one lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagAverages {
    /// Mean of the intensity products.
    pub g2: f64,
    /// Mean of the leading samples.
    pub i_past: f64,
    /// Mean of the trailing samples.
    pub i_future: f64,
    /// Number of contributing pairs.
    pub pairs: usize,
}

/// Highest level reachable for a series of `frame_count` points.
///
/// Zero when the series is shorter than two delays-per-level blocks;
/// otherwise `floor(log2 N - log2(1 + 1/dpl)) - log2 dpl`, truncated.
pub fn level_max(frame_count: usize, dpl: u32) -> u32 {
    if frame_count < 2 * dpl as usize {
        return 0;
    }

    let n = frame_count as f64;
    let dpl = dpl as f64;
    let levels = (n.log2() - (1.0 + 1.0 / dpl).log2()).floor() - dpl.log2();
    if levels < 0.0 {
        0
    } else {
        levels as u32
    }
}

/// Number of lags evaluated at a level: `2*dpl - 1` at level 0, `dpl` above.
#[inline]
pub fn delay_count(dpl: u32, level: u32) -> u32 {
    if level == 0 {
        2 * dpl - 1
    } else {
        dpl
    }
}

/// Usable series length at a level.
///
/// Levels above 0 ignore the trailing odd frame of an odd-length series.
#[inline]
pub fn usable_length(frame_count: usize, level: u32) -> usize {
    if frame_count % 2 == 0 || level == 0 {
        frame_count
    } else {
        frame_count.saturating_sub(1)
    }
}

/// Applies one round of in-place average smoothing for the given step.
///
/// `I[t] = (I[t] + I[t + step/2]) / 2` for t stepping by `step`; rounds
/// accumulate across levels. A step of 1 (level 0) is a no-op.
pub fn smooth(intensities: &mut [f64], len: usize, step: usize) {
    if step <= 1 {
        return;
    }

    let len = len.min(intensities.len());
    let half = step / 2;
    let mut t = 0;
    while t + half < len {
        intensities[t] = (intensities[t] + intensities[t + half]) / 2.0;
        t += step;
    }
}

/// Averages `I[t] * I[t + tau]` over `t = 0, step, 2*step, ...` while
/// `t + tau` stays inside the usable length.
pub fn correlate_at(
    intensities: &[f64],
    usable: usize,
    tau: usize,
    step: usize,
) -> Option<LagAverages> {
    let usable = usable.min(intensities.len());
    let mut numerator = 0.0;
    let mut sum_past = 0.0;
    let mut sum_future = 0.0;
    let mut pairs = 0usize;

    let mut t = 0;
    while t + tau < usable {
        numerator += intensities[t] * intensities[t + tau];
        sum_past += intensities[t];
        sum_future += intensities[t + tau];
        pairs += 1;
        t += step;
    }

    finish(numerator, sum_past, sum_future, pairs)
}

/// Slice-level kinetics correlation at lag `tau`.
///
/// Level-0 pairs stepping by one, excluding any pair whose endpoints fall
/// in different physical frames.
pub fn correlate_slices(
    intensities: &[f64],
    tau: usize,
    slices_per_frame: usize,
) -> Option<LagAverages> {
    let mut numerator = 0.0;
    let mut sum_past = 0.0;
    let mut sum_future = 0.0;
    let mut pairs = 0usize;

    for t in 0..intensities.len().saturating_sub(tau) {
        if (t + tau) / slices_per_frame != t / slices_per_frame {
            continue;
        }
        numerator += intensities[t] * intensities[t + tau];
        sum_past += intensities[t];
        sum_future += intensities[t + tau];
        pairs += 1;
    }

    finish(numerator, sum_past, sum_future, pairs)
}

/// Kinetics slice-overlap correlation.
///
/// Pairs the last slice of each physical frame with the first usable slice
/// of the next, averaged over all adjacent frame pairs.
pub fn correlate_slice_overlap(
    intensities: &[f64],
    slices_per_frame: usize,
) -> Option<LagAverages> {
    let mut numerator = 0.0;
    let mut sum_past = 0.0;
    let mut sum_future = 0.0;
    let mut pairs = 0usize;

    let mut last = slices_per_frame - 1;
    let mut first_next = slices_per_frame;
    while first_next < intensities.len() {
        numerator += intensities[last] * intensities[first_next];
        sum_past += intensities[last];
        sum_future += intensities[first_next];
        pairs += 1;

        last += slices_per_frame;
        first_next += slices_per_frame;
    }

    finish(numerator, sum_past, sum_future, pairs)
}

/// Collapses each physical frame's slices into their mean, in place.
///
/// The reduced series occupies the first `frames` slots; returns `frames`.
pub fn average_slices(intensities: &mut [f64], slices_per_frame: usize) -> usize {
    let frames = intensities.len() / slices_per_frame;

    let mut out = 0;
    let mut sum = 0.0;
    for i in 0..frames * slices_per_frame {
        sum += intensities[i];
        if (i + 1) % slices_per_frame == 0 {
            intensities[out] = sum / slices_per_frame as f64;
            sum = 0.0;
            out += 1;
        }
    }

    frames
}

fn finish(numerator: f64, sum_past: f64, sum_future: f64, pairs: usize) -> Option<LagAverages> {
    if pairs == 0 {
        return None;
    }
    let count = pairs as f64;
    Some(LagAverages {
        g2: numerator / count,
        i_past: sum_past / count,
        i_future: sum_future / count,
        pairs,
    })
}
