//! Runs the ordered rule set over a finished candidate layout.
//!
//! Every rule is evaluated even after a failure so the log is always complete;
//! the verdict is the conjunction of all reported checks.

use crate::catalog::Catalog;
use crate::geometry::occupancy_index;
use crate::model::{Configuration, RequiredCounts, RuleLogEntry, RuleStatus};
use crate::rules::{LayoutRule, RuleContext, RuleLimits, standard_rules};

/// Verdict of one validation run.
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub is_valid: bool,
    pub log: Vec<RuleLogEntry>,
}

pub struct RuleValidator {
    rules: Vec<Box<dyn LayoutRule>>,
}

impl RuleValidator {
    /// Validator with an explicit rule list, run in the given order.
    pub fn new(rules: Vec<Box<dyn LayoutRule>>) -> Self {
        Self { rules }
    }

    /// Validator with the standard structural rules.
    pub fn standard(catalog: &Catalog, limits: RuleLimits) -> Self {
        Self::new(standard_rules(catalog, limits))
    }

    /// Checks a complete configuration.
    ///
    /// # Parameters
    /// * `configuration` - The candidate layout
    /// * `counts` - Requested counts (reported by the count rule)
    /// * `attempt` - Outer attempt number, used in the closing status line
    pub fn validate(
        &self,
        configuration: &Configuration,
        counts: &RequiredCounts,
        attempt: u32,
    ) -> Verdict {
        let occupancy = occupancy_index(configuration);
        let ctx = RuleContext {
            configuration,
            counts,
            occupancy: &occupancy,
        };

        let mut is_valid = true;
        let mut log = Vec::new();
        for rule in &self.rules {
            for check in rule.evaluate(&ctx) {
                is_valid &= check.passed;
                log.push(RuleLogEntry::new(
                    check.rule,
                    RuleStatus::from_passed(check.passed),
                    check.message,
                ));
            }
        }

        log.push(RuleLogEntry::new(
            "Attempt Status",
            RuleStatus::from_passed(is_valid),
            format!(
                "Attempt {} Final Status: {}",
                attempt,
                if is_valid { "VALID" } else { "INVALID" }
            ),
        ));

        Verdict { is_valid, log }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BlockType;
    use crate::model::PlacedBlock;
    use crate::rules::RuleCheck;

    fn layout(blocks: &[(BlockType, (i32, i32, i32))]) -> Configuration {
        let catalog = Catalog::default();
        blocks
            .iter()
            .enumerate()
            .map(|(i, (t, origin))| PlacedBlock::from_catalog(i as u32 + 1, *t, *origin, &catalog))
            .collect()
    }

    fn standard() -> RuleValidator {
        RuleValidator::standard(&Catalog::default(), RuleLimits::default())
    }

    #[test]
    fn valid_layout_passes_every_rule() {
        let configuration = layout(&[
            (BlockType::Comfort, (1, 1, 1)),
            (BlockType::Comfort, (3, 1, 1)),
            (BlockType::Transparent, (1, 1, 2)),
            (BlockType::Opaque, (1, 3, 1)),
        ]);
        let verdict = standard().validate(&configuration, &RequiredCounts::new(2, 1, 1), 4);

        assert!(verdict.is_valid);
        assert!(verdict.log.iter().all(|e| e.status == RuleStatus::Pass));
        let last = verdict.log.last().unwrap();
        assert_eq!(last.rule, "Attempt Status");
        assert_eq!(last.message, "Attempt 4 Final Status: VALID");
    }

    #[test]
    fn failing_rule_does_not_short_circuit() {
        // Opaque above ground and only one Comfort on the ground, but connected.
        let configuration = layout(&[
            (BlockType::Comfort, (1, 1, 1)),
            (BlockType::Opaque, (1, 1, 2)),
        ]);
        let verdict = standard().validate(&configuration, &RequiredCounts::new(1, 0, 1), 1);

        assert!(!verdict.is_valid);
        // 6 rule lines plus the status line
        assert_eq!(verdict.log.len(), 7);
        let failed: Vec<&str> = verdict
            .log
            .iter()
            .filter(|e| e.status == RuleStatus::Fail)
            .map(|e| e.rule.as_str())
            .collect();
        assert_eq!(
            failed,
            vec![
                "2.2 Min Comfort on Ground (>=2)",
                "5.1.1 Opaque Only on Ground (Z=1)",
                "Attempt Status",
            ]
        );
    }

    #[test]
    fn custom_rule_list_is_honoured() {
        struct AlwaysFails;
        impl LayoutRule for AlwaysFails {
            fn evaluate(&self, _ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
                vec![RuleCheck {
                    rule: "never".to_string(),
                    passed: false,
                    message: "nope".to_string(),
                }]
            }
        }

        let validator = RuleValidator::new(vec![Box::new(AlwaysFails)]);
        let verdict = validator.validate(&Configuration::new(), &RequiredCounts::default(), 2);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.log.len(), 2);
        assert_eq!(verdict.log[0].rule, "never");
    }
}
