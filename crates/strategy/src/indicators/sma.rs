/// Simple moving average over a closing-price slice (oldest first).
///
/// Each output value is the arithmetic mean of the trailing `window` inputs
/// ending at and including that index. There are no partial windows: the
/// first `window - 1` outputs are `None`. A zero window yields all `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    // Each window is summed from scratch; no running total.
    for (i, w) in values.windows(window).enumerate() {
        out[i + window - 1] = Some(w.iter().sum::<f64>() / window as f64);
    }
    out
}

/// Mean of the last `window` values, or `None` if there are fewer.
pub fn latest_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}
