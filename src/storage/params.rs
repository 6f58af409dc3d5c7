//! Call filtering thresholds.

use thiserror::Error;

/// Errors raised when validating [`BuildParameters`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A threshold that must be non-negative is negative or not a number.
    #[error("`{name}` must be a non-negative number, got {value}")]
    Negative {
        /// Parameter name.
        name: &'static str,
        /// Supplied value.
        value: f64,
    },

    /// A frequency threshold lies outside `[0, 1]`.
    #[error("`{name}` must lie within [0, 1], got {value}")]
    NotAFrequency {
        /// Parameter name.
        name: &'static str,
        /// Supplied value.
        value: f64,
    },

    /// The heterozygous frequency window is empty.
    #[error("heterozygous frequency window [{min}, {max}] is empty")]
    EmptyHeterozygousWindow {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

/// Thresholds deciding whether a variant call is accepted.
///
/// All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildParameters {
    /// Minimal read depth at the call site.
    pub min_coverage: f64,
    /// Minimal Phred-scaled call quality.
    pub min_quality: f64,
    /// Minimal allele frequency of a homozygous call.
    pub min_homozygous_frequency: f64,
    /// Minimal allele frequency of a heterozygous call.
    pub min_heterozygous_frequency: f64,
    /// Maximal allele frequency of a heterozygous call.
    pub max_heterozygous_frequency: f64,
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            min_coverage: 5.0,
            min_quality: 30.0,
            min_homozygous_frequency: 0.65,
            min_heterozygous_frequency: 0.45,
            max_heterozygous_frequency: 0.55,
        }
    }
}

impl BuildParameters {
    /// Set the minimal read depth.
    pub fn with_min_coverage(mut self, value: f64) -> Self {
        self.min_coverage = value;
        self
    }

    /// Set the minimal call quality.
    pub fn with_min_quality(mut self, value: f64) -> Self {
        self.min_quality = value;
        self
    }

    /// Set the minimal homozygous frequency.
    pub fn with_min_homozygous_frequency(mut self, value: f64) -> Self {
        self.min_homozygous_frequency = value;
        self
    }

    /// Set the heterozygous frequency window.
    pub fn with_heterozygous_window(mut self, min: f64, max: f64) -> Self {
        self.min_heterozygous_frequency = min;
        self.max_heterozygous_frequency = max;
        self
    }

    /// Check every threshold for plausibility.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("min_coverage", self.min_coverage),
            ("min_quality", self.min_quality),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        for (name, value) in [
            ("min_homozygous_frequency", self.min_homozygous_frequency),
            ("min_heterozygous_frequency", self.min_heterozygous_frequency),
            ("max_heterozygous_frequency", self.max_heterozygous_frequency),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAFrequency { name, value });
            }
        }
        if self.min_heterozygous_frequency > self.max_heterozygous_frequency {
            return Err(ConfigError::EmptyHeterozygousWindow {
                min: self.min_heterozygous_frequency,
                max: self.max_heterozygous_frequency,
            });
        }
        Ok(())
    }

    /// Whether a call with the given metrics fails any threshold.
    pub fn rejects(&self, quality: f64, depth: f64, frequency: f64, heterozygous: bool) -> bool {
        quality < self.min_quality
            || depth < self.min_coverage
            || if heterozygous {
                frequency < self.min_heterozygous_frequency
                    || frequency > self.max_heterozygous_frequency
            } else {
                frequency < self.min_homozygous_frequency
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BuildParameters::default().validate().is_ok());
    }

    #[test]
    fn invalid_thresholds_are_reported() {
        let params = BuildParameters::default().with_min_coverage(-1.0);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Negative { name: "min_coverage", .. })
        ));

        let params = BuildParameters::default().with_min_homozygous_frequency(1.5);
        assert!(matches!(params.validate(), Err(ConfigError::NotAFrequency { .. })));

        let params = BuildParameters::default().with_heterozygous_window(0.6, 0.4);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::EmptyHeterozygousWindow { .. })
        ));
    }

    #[test]
    fn thresholds_are_inclusive() {
        let params = BuildParameters::default();
        assert!(!params.rejects(30.0, 5.0, 0.65, false));
        assert!(params.rejects(29.99, 5.0, 0.65, false));
        assert!(params.rejects(30.0, 4.0, 0.65, false));
        assert!(params.rejects(30.0, 5.0, 0.64, false));
        assert!(!params.rejects(30.0, 5.0, 0.45, true));
        assert!(!params.rejects(30.0, 5.0, 0.55, true));
        assert!(params.rejects(30.0, 5.0, 0.56, true));
        assert!(params.rejects(30.0, 5.0, 0.9, true));
    }
}
