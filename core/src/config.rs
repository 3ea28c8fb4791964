use serde::{Deserialize, Serialize};

use crate::types::LoanId;

/// Inclusive range loan identifiers are drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanIdRange {
    pub min: LoanId,
    pub max: LoanId,
}

impl LoanIdRange {
    pub fn new(min: LoanId, max: LoanId) -> Self {
        Self { min, max }
    }

    /// Number of identifiers in the range.
    pub fn size(&self) -> u64 {
        (self.max - self.min) as u64 + 1
    }

    pub fn contains(&self, id: LoanId) -> bool {
        (self.min..=self.max).contains(&id)
    }
}

impl Default for LoanIdRange {
    fn default() -> Self {
        Self { min: 10_000, max: 99_999 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub loan_id_range: LoanIdRange,
    /// Random draws before the allocator falls back to a linear probe.
    pub max_random_attempts: u32,
    /// Largest share of monthly salary an installment may take.
    pub affordability_ratio: f64,
    /// Seed for the loan ID allocator. None = seeded from OS entropy.
    pub id_seed: Option<u64>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            loan_id_range: LoanIdRange::default(),
            max_random_attempts: 32,
            affordability_ratio: 0.5,
            id_seed: None,
        }
    }
}

impl DeskConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: DeskConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with a fixed allocator seed, for tests.
    pub fn default_test() -> Self {
        Self {
            id_seed: Some(42),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let range = self.loan_id_range;
        if range.min > range.max {
            anyhow::bail!(
                "loan_id_range.min ({}) must not exceed loan_id_range.max ({})",
                range.min,
                range.max
            );
        }
        if range.min < 0 {
            anyhow::bail!("loan_id_range.min must be non-negative, got {}", range.min);
        }
        if self.max_random_attempts == 0 {
            anyhow::bail!("max_random_attempts must be at least 1");
        }
        if !(self.affordability_ratio > 0.0 && self.affordability_ratio <= 1.0) {
            anyhow::bail!(
                "affordability_ratio must be in (0, 1], got {}",
                self.affordability_ratio
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_id_range() {
        let config = DeskConfig::default();
        assert_eq!(config.loan_id_range, LoanIdRange::new(10_000, 99_999));
        assert_eq!(config.loan_id_range.size(), 90_000);
        assert_eq!(config.affordability_ratio, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DeskConfig =
            serde_json::from_str(r#"{ "id_seed": 7, "loan_id_range": { "min": 1, "max": 9 } }"#)
                .unwrap();
        assert_eq!(config.id_seed, Some(7));
        assert_eq!(config.loan_id_range.size(), 9);
        assert_eq!(config.max_random_attempts, 32);
    }

    #[test]
    fn inverted_range_rejected() {
        let config = DeskConfig {
            loan_id_range: LoanIdRange::new(500, 100),
            ..DeskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn affordability_ratio_out_of_bounds_rejected() {
        let config = DeskConfig {
            affordability_ratio: 1.5,
            ..DeskConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
