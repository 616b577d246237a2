use serde::{Deserialize, Serialize};

use crate::QualityProfile;

/// 100 MiB.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Decides whether a compressed file earns a second, more aggressive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub large_file_threshold: u64,
    pub fallback_profile: QualityProfile,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            fallback_profile: QualityProfile::Aggressive,
        }
    }
}

impl RetryPolicy {
    /// Profile for the second pass, if one is due after a first pass at
    /// `requested` produced `output_size` bytes.
    pub fn fallback_for(&self, requested: QualityProfile, output_size: u64) -> Option<QualityProfile> {
        if output_size <= self.large_file_threshold {
            return None;
        }
        if requested.is_at_least_as_aggressive_as(self.fallback_profile) {
            return None;
        }
        Some(self.fallback_profile)
    }

    /// The fallback result wins unless it came out larger than the first pass.
    pub fn keep_fallback(&self, first_pass_size: u64, fallback_size: u64) -> bool {
        fallback_size <= first_pass_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_outputs_are_accepted() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.fallback_for(QualityProfile::Screen, 1024), None);
        assert_eq!(
            policy.fallback_for(QualityProfile::Ebook, DEFAULT_LARGE_FILE_THRESHOLD),
            None
        );
    }

    #[test]
    fn oversized_outputs_fall_back_once() {
        let policy = RetryPolicy::default();
        let big = DEFAULT_LARGE_FILE_THRESHOLD + 1;
        assert_eq!(
            policy.fallback_for(QualityProfile::Prepress, big),
            Some(QualityProfile::Aggressive)
        );
        assert_eq!(policy.fallback_for(QualityProfile::Aggressive, big), None);
    }

    #[test]
    fn configured_fallback_bounds_retry() {
        let policy = RetryPolicy {
            large_file_threshold: 10,
            fallback_profile: QualityProfile::Screen,
        };
        assert_eq!(policy.fallback_for(QualityProfile::Screen, 11), None);
        assert_eq!(
            policy.fallback_for(QualityProfile::Printer, 11),
            Some(QualityProfile::Screen)
        );
    }
}
