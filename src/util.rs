/// Arithmetic mean of millisecond samples
pub fn mean(samples: &[u64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: u64 = samples.iter().sum();
    Some(total as f64 / samples.len() as f64)
}

/// Population standard deviation of millisecond samples
pub fn std_dev(samples: &[u64]) -> Option<f64> {
    let avg = mean(samples)?;
    let variance = samples
        .iter()
        .map(|&s| {
            let diff = s as f64 - avg;
            diff * diff
        })
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

/// `part` as a percentage of `whole`, rounded to one decimal place
pub fn percentage(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some((part as f64 / whole as f64 * 1000.0).round() / 10.0)
}
