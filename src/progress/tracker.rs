//! Validation of an observed percentage sequence.

use super::ProgressError;

/// Percentages seen so far for one command.
///
/// Each new value must lie within 0-100 and must not be lower than the
/// previous one.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    history: Vec<f64>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Decreased` if `value` is below the last value
    /// and `ProgressError::OutOfRange` if it lies outside 0-100. Rejected
    /// values are not recorded.
    pub fn observe(&mut self, value: f64) -> Result<(), ProgressError> {
        if let Some(last) = self.last() {
            if value < last {
                return Err(ProgressError::Decreased {
                    from: last,
                    to: value,
                    history: self.history.clone(),
                });
            }
        }
        if !(0.0..=100.0).contains(&value) {
            return Err(ProgressError::OutOfRange {
                value,
                history: self.history.clone(),
            });
        }
        self.history.push(value);
        Ok(())
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.history.last().copied()
    }

    #[must_use]
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    #[must_use]
    pub fn into_history(self) -> Vec<f64> {
        self.history
    }
}
