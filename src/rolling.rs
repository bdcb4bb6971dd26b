//! # Rolling Window
//! Trailing moving average over a contiguous bucket series.
//!
//! Used for the smoothed line drawn on top of the daily event counts. The
//! window is measured in buckets, not wall-clock time, because the series it
//! runs over never has gaps.

use std::collections::VecDeque;

/// Buckets averaged per point unless configured otherwise.
pub const DEFAULT_ROLLING_WINDOW: usize = 3;

/// Trailing window accumulator over integer counts.
#[derive(Debug)]
pub struct RollingWindow {
    buf: VecDeque<usize>,
    sum: usize,
    window: usize,
}

impl RollingWindow {
    /// Create a window averaging the last `window` values (min 1).
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            buf: VecDeque::with_capacity(window),
            sum: 0,
            window,
        }
    }

    /// Push a value and return the mean of the values currently in the window.
    ///
    /// Until `window` values have been seen the mean covers what is available.
    pub fn push(&mut self, v: usize) -> f64 {
        self.buf.push_back(v);
        self.sum += v;
        if self.buf.len() > self.window {
            if let Some(old) = self.buf.pop_front() {
                self.sum -= old;
            }
        }
        self.sum as f64 / self.buf.len() as f64
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Trailing means for a whole series, one per input value.
pub fn rolling_means(values: &[usize], window: usize) -> Vec<f64> {
    let mut w = RollingWindow::with_window(window);
    values.iter().map(|&v| w.push(v)).collect()
}
