use crate::solana::models::CanonicalTransaction;
use crate::swap::deltas::DeltaSummary;
use crate::swap::models::Confidence;

/// Signals that raise confidence in a classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfidenceSignals {
    pub protocol_tagged: bool,
    pub full_coverage: bool,
    pub fee_payer_is_monitored: bool,
}

impl ConfidenceSignals {
    pub fn gather(tx: &CanonicalTransaction, summary: &DeltaSummary, monitored: &str) -> Self {
        Self {
            protocol_tagged: tx.protocol.as_deref().is_some_and(|p| !p.is_empty()),
            full_coverage: summary.full_coverage,
            fee_payer_is_monitored: tx.fee_payer == monitored,
        }
    }

    pub fn count(&self) -> usize {
        [self.protocol_tagged, self.full_coverage, self.fee_payer_is_monitored]
            .into_iter()
            .filter(|signal| *signal)
            .count()
    }

    /// Each signal present can only raise the level.
    pub fn level(&self) -> Confidence {
        match self.count() {
            0 | 1 => Confidence::Low,
            2 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

pub fn score(tx: &CanonicalTransaction, summary: &DeltaSummary, monitored: &str) -> Confidence {
    ConfidenceSignals::gather(tx, summary, monitored).level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_rise_with_signals() {
        let none = ConfidenceSignals::default();
        assert_eq!(none.level(), Confidence::Low);

        let two = ConfidenceSignals {
            protocol_tagged: true,
            fee_payer_is_monitored: true,
            ..Default::default()
        };
        assert_eq!(two.level(), Confidence::Medium);

        let all = ConfidenceSignals {
            protocol_tagged: true,
            full_coverage: true,
            fee_payer_is_monitored: true,
        };
        assert_eq!(all.level(), Confidence::High);
    }

    #[test]
    fn adding_a_signal_never_lowers_the_level() {
        for bits in 0u8..8 {
            let base = ConfidenceSignals {
                protocol_tagged: bits & 1 != 0,
                full_coverage: bits & 2 != 0,
                fee_payer_is_monitored: bits & 4 != 0,
            };
            let raised = ConfidenceSignals {
                protocol_tagged: true,
                ..base
            };
            assert!(raised.level() >= base.level());
        }
    }
}
