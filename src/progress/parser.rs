//! Percentage extraction from command output.

use std::sync::LazyLock;

use regex::Regex;

static PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)%").expect("percentage pattern is a valid regex")
});

/// Longest tail kept between chunks while waiting for a `%`.
const MAX_PENDING: usize = 64;

/// Every percentage in `text`, in order of appearance.
#[must_use]
pub fn parse_percentages(text: &str) -> Vec<f64> {
    PERCENT
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Incremental percentage parser.
///
/// Output arrives in arbitrary chunks, so a value such as `45.5%` may be
/// split across reads. Text after the last `%` is held back and prefixed to
/// the next chunk.
#[derive(Debug, Default)]
pub struct PercentScanner {
    pending: String,
}

impl PercentScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of output and return the percentages it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<f64> {
        self.pending.push_str(chunk);

        let values = match self.pending.rfind('%') {
            Some(end) => {
                let values = parse_percentages(&self.pending[..=end]);
                self.pending.drain(..=end);
                values
            }
            None => Vec::new(),
        };

        if self.pending.len() > MAX_PENDING {
            let mut cut = self.pending.len() - MAX_PENDING;
            while !self.pending.is_char_boundary(cut) {
                cut += 1;
            }
            self.pending.drain(..cut);
        }
        values
    }
}
