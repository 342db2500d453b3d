/// Calculate Simple Moving Average (SMA) over the most recent `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Rolling SMA for every index where the window is fully populated.
///
/// The result is aligned to the end of the input: `result[k]` is the mean
/// of `values[k..k + period]`, so the last element of the result is the
/// SMA of the last `period` input values. Indices with an incomplete
/// window are absent rather than padded.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }

    out
}
