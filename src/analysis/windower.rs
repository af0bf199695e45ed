use crate::models::SensorSample;

pub const WINDOW_SIZE: usize = 128;

/// A full-length run of consecutive samples. Never padded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow<'a> {
    samples: &'a [SensorSample],
}

impl<'a> SampleWindow<'a> {
    pub fn samples(&self) -> &'a [SensorSample] {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Splits `samples` into consecutive windows of exactly `size`, dropping a
/// short tail. A zero size yields no windows.
pub fn window(samples: &[SensorSample], size: usize) -> Vec<SampleWindow<'_>> {
    if size == 0 {
        return Vec::new();
    }
    samples
        .chunks_exact(size)
        .map(|samples| SampleWindow { samples })
        .collect()
}

pub fn window_count(sample_count: usize, size: usize) -> usize {
    sample_count.checked_div(size).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EulerAngles, Vec3};

    fn samples(n: usize) -> Vec<SensorSample> {
        (0..n)
            .map(|i| {
                SensorSample::new(
                    i as i64,
                    Vec3::default(),
                    Vec3::default(),
                    EulerAngles::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_counts() {
        for n in [0, 1, 127, 128, 129, 255, 256, 1000] {
            let input = samples(n);
            let windows = window(&input, WINDOW_SIZE);
            assert_eq!(windows.len(), n / WINDOW_SIZE, "n = {n}");
            assert_eq!(window_count(n, WINDOW_SIZE), n / WINDOW_SIZE);
            assert!(windows.iter().all(|w| w.len() == WINDOW_SIZE));
        }
    }

    #[test]
    fn test_order_preserved_and_tail_dropped() {
        let input = samples(300);
        let windows = window(&input, WINDOW_SIZE);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].samples()[0].timestamp_ms, 0);
        assert_eq!(windows[1].samples()[0].timestamp_ms, 128);
        assert_eq!(windows[1].samples()[127].timestamp_ms, 255);
    }

    #[test]
    fn test_zero_size() {
        assert!(window(&samples(10), 0).is_empty());
        assert_eq!(window_count(10, 0), 0);
    }
}
