//! Outer generate-and-test loop.
//!
//! Each attempt builds a fresh candidate with the placement generator and runs the
//! rule validator over it. The first valid candidate wins; otherwise the search
//! stops after `max_overall_attempts` and reports failure with the full log.

use rand::Rng;
use serde::Serialize;
use utoipa::ToSchema;

use crate::analyzer::{GeometricAnalyzer, LayoutAnalysis};
use crate::catalog::Catalog;
use crate::generator::PlacementGenerator;
use crate::model::{PlacedBlock, RequiredCounts, RuleLogEntry, RuleStatus};
use crate::rules::RuleLimits;
use crate::validator::RuleValidator;

/// Configuration for the layout search.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub catalog: Catalog,
    /// Outer attempts before the search gives up
    pub max_overall_attempts: u32,
    /// Random samples per block before a candidate is abandoned
    pub max_block_retries: u32,
    pub limits: RuleLimits,
}

impl GenerationConfig {
    pub const DEFAULT_MAX_OVERALL_ATTEMPTS: u32 = 1000;
    pub const DEFAULT_MAX_BLOCK_RETRIES: u32 = PlacementGenerator::DEFAULT_MAX_BLOCK_RETRIES;

    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder::default()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            max_overall_attempts: Self::DEFAULT_MAX_OVERALL_ATTEMPTS,
            max_block_retries: Self::DEFAULT_MAX_BLOCK_RETRIES,
            limits: RuleLimits::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn max_overall_attempts(mut self, attempts: u32) -> Self {
        self.config.max_overall_attempts = attempts;
        self
    }

    pub fn max_block_retries(mut self, retries: u32) -> Self {
        self.config.max_block_retries = retries;
        self
    }

    pub fn limits(mut self, limits: RuleLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn build(self) -> GenerationConfig {
        self.config
    }
}

/// Outcome of one search.
///
/// Either a complete, validated layout with analysis, or a failure with empty
/// `coords` and no analysis. The log is present in both cases.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct GenerationResult {
    pub success: bool,
    pub attempts_used: u32,
    pub coords: Vec<PlacedBlock>,
    #[schema(nullable = true)]
    pub analysis: Option<LayoutAnalysis>,
    pub log: Vec<RuleLogEntry>,
}

impl GenerationResult {
    /// One-line summary for consoles.
    pub fn summary(&self, max_overall_attempts: u32) -> String {
        if self.success {
            format!(
                "SUCCESS! Valid configuration found after {} attempts.",
                self.attempts_used
            )
        } else {
            format!(
                "FAILURE! Could not find a valid configuration after {} attempts. Check rule log for details.",
                max_overall_attempts
            )
        }
    }
}

/// Why an attempt was discarded.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Some block exhausted its placement retries.
    GenerationFailure,
    /// The candidate was complete but broke at least one rule.
    RuleViolation { failed_rules: Vec<String> },
}

/// Progress events emitted during a search, for live views.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum SearchEvent {
    /// An attempt was discarded.
    AttemptRejected {
        attempt: u32,
        reason: RejectionReason,
    },
    /// The search finished.
    Finished { success: bool, attempts_used: u32 },
}

/// Searches with the default catalog and limits and a thread-local random source.
#[allow(dead_code)]
pub fn generate(
    comfort_count: u32,
    transparent_count: u32,
    opaque_count: u32,
    max_overall_attempts: u32,
) -> GenerationResult {
    let config = GenerationConfig::builder()
        .max_overall_attempts(max_overall_attempts)
        .build();
    generate_with_config(
        RequiredCounts::new(comfort_count, transparent_count, opaque_count),
        &config,
        &mut rand::thread_rng(),
    )
}

/// Searches with an explicit configuration and random source.
pub fn generate_with_config<R: Rng>(
    counts: RequiredCounts,
    config: &GenerationConfig,
    rng: &mut R,
) -> GenerationResult {
    generate_with_progress(counts, config, rng, |_| {})
}

/// Searches and reports every discarded attempt through `on_event`.
pub fn generate_with_progress<R: Rng>(
    counts: RequiredCounts,
    config: &GenerationConfig,
    rng: &mut R,
    mut on_event: impl FnMut(&SearchEvent),
) -> GenerationResult {
    let catalog = &config.catalog;
    let analyzer = GeometricAnalyzer::new(catalog);

    if counts.total() == 0 {
        let result = GenerationResult {
            success: true,
            attempts_used: 0,
            coords: Vec::new(),
            analysis: Some(analyzer.analyze(&Default::default())),
            log: vec![RuleLogEntry::new(
                "2.1 Required Block Count",
                RuleStatus::Pass,
                "No blocks requested; the empty layout is trivially valid.",
            )],
        };
        on_event(&SearchEvent::Finished {
            success: true,
            attempts_used: 0,
        });
        return result;
    }

    let required_cells = counts.required_cells(catalog);
    if required_cells > catalog.grid_cells() {
        tracing::warn!(
            required_cells,
            grid_cells = catalog.grid_cells(),
            "requested blocks exceed the grid; every attempt will fail placement"
        );
    }

    let generator = PlacementGenerator::new(catalog, config.max_block_retries);
    let validator = RuleValidator::standard(catalog, config.limits);

    let mut log = Vec::new();
    let mut attempt = 0;

    while attempt < config.max_overall_attempts {
        attempt += 1;

        let Some(configuration) = generator.try_generate(&counts, rng) else {
            tracing::debug!(attempt, "placement exhausted its retry budget");
            log.push(RuleLogEntry::new(
                "Generation Failure",
                RuleStatus::Fail,
                format!(
                    "Attempt {} failed: Could not place all blocks while maintaining connectivity and no collision.",
                    attempt
                ),
            ));
            on_event(&SearchEvent::AttemptRejected {
                attempt,
                reason: RejectionReason::GenerationFailure,
            });
            continue;
        };

        let verdict = validator.validate(&configuration, &counts, attempt);
        let failed_rules: Vec<String> = verdict
            .log
            .iter()
            .filter(|e| e.status == RuleStatus::Fail && e.rule != "Attempt Status")
            .map(|e| e.rule.clone())
            .collect();
        log.extend(verdict.log);

        if verdict.is_valid {
            tracing::info!(attempt, blocks = configuration.len(), "valid layout found");
            on_event(&SearchEvent::Finished {
                success: true,
                attempts_used: attempt,
            });
            return GenerationResult {
                success: true,
                attempts_used: attempt,
                coords: configuration.to_coords(),
                analysis: Some(analyzer.analyze(&configuration)),
                log,
            };
        }

        tracing::debug!(attempt, ?failed_rules, "candidate rejected");
        log.push(RuleLogEntry::new(
            "Separator",
            RuleStatus::Separator,
            format!("--- End of Attempt {} (Invalid) ---", attempt),
        ));
        on_event(&SearchEvent::AttemptRejected {
            attempt,
            reason: RejectionReason::RuleViolation { failed_rules },
        });
    }

    tracing::info!(attempts = attempt, "no valid layout within the attempt budget");
    on_event(&SearchEvent::Finished {
        success: false,
        attempts_used: attempt,
    });
    GenerationResult {
        success: false,
        attempts_used: attempt,
        coords: Vec::new(),
        analysis: None,
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BlockType;
    use crate::geometry::{occupancy_index, overlaps};
    use crate::model::Configuration;
    use crate::rules::{
        connected_from_first, ground_comfort_count, longest_ground_runs, max_stacked_levels,
        opaque_above_ground,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn assert_valid_layout(
        result: &GenerationResult,
        counts: RequiredCounts,
        config: &GenerationConfig,
    ) {
        assert!(result.success);
        assert_eq!(result.coords.len() as u64, counts.total());

        let configuration: Configuration = result.coords.iter().copied().collect();
        let grid_max = config.catalog.grid_max();
        for (i, a) in result.coords.iter().enumerate() {
            for b in &result.coords[i + 1..] {
                assert!(!overlaps(a, b), "Blocks {} and {} overlap", a.id, b.id);
            }
        }
        assert_eq!(connected_from_first(&configuration), configuration.len());
        assert!(max_stacked_levels(&occupancy_index(&configuration), grid_max).0 <= 3);
        let (x_run, y_run) = longest_ground_runs(&configuration, grid_max);
        assert!(x_run <= 4 && y_run <= 4);
        assert!(ground_comfort_count(&configuration) >= 2);
        assert!(opaque_above_ground(&configuration).is_empty());
    }

    #[test]
    fn zero_blocks_is_immediate_success() {
        let result = generate(0, 0, 0, 1000);
        assert!(result.success);
        assert_eq!(result.attempts_used, 0);
        assert!(result.coords.is_empty());

        let analysis = result.analysis.expect("success carries an analysis");
        assert_eq!(analysis.parameters.volume, 0.0);
        assert_eq!(analysis.cog, crate::types::Vec3::zero());
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["main_front"], "N/A");
    }

    #[test]
    fn two_comfort_blocks_rest_side_by_side() {
        let config = GenerationConfig::default();
        let counts = RequiredCounts::new(2, 0, 0);
        let result = generate_with_config(counts, &config, &mut ChaCha8Rng::seed_from_u64(2024));

        assert_valid_layout(&result, counts, &config);
        assert!(result.coords.iter().all(|b| b.z == 1));
        assert!(result.analysis.is_some());
        assert_eq!(
            result.log.last().map(|e| e.message.as_str()),
            Some(format!("Attempt {} Final Status: VALID", result.attempts_used).as_str())
        );
    }

    #[test]
    fn typical_request_yields_valid_layout() {
        let config = GenerationConfig::default();
        let counts = RequiredCounts::new(5, 3, 1);
        let result = generate_with_config(counts, &config, &mut ChaCha8Rng::seed_from_u64(5));
        if result.success {
            assert_valid_layout(&result, counts, &config);
            let configuration: Configuration = result.coords.iter().copied().collect();
            assert_eq!(configuration.count_of(BlockType::Comfort), 5);
            assert_eq!(configuration.count_of(BlockType::Transparent), 3);
            assert_eq!(configuration.count_of(BlockType::Opaque), 1);
        } else {
            assert!(result.coords.is_empty());
            assert_eq!(result.attempts_used, config.max_overall_attempts);
        }
    }

    #[test]
    fn same_seed_reproduces_result() {
        let config = GenerationConfig::default();
        let counts = RequiredCounts::new(2, 1, 0);
        let first = generate_with_config(counts, &config, &mut ChaCha8Rng::seed_from_u64(42));
        let second = generate_with_config(counts, &config, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn impossible_request_uses_whole_budget() {
        // A single Comfort block can never satisfy the two-on-the-ground rule.
        let config = GenerationConfig::builder().max_overall_attempts(25).build();
        let result = generate_with_config(
            RequiredCounts::new(1, 0, 0),
            &config,
            &mut ChaCha8Rng::seed_from_u64(9),
        );

        assert!(!result.success);
        assert_eq!(result.attempts_used, 25);
        assert!(result.coords.is_empty());
        assert!(result.analysis.is_none());
        assert!(!result.log.is_empty());
        let separators = result
            .log
            .iter()
            .filter(|e| e.status == RuleStatus::Separator)
            .count();
        assert_eq!(separators, 25);
        assert!(result.summary(25).starts_with("FAILURE!"));
    }

    #[test]
    fn over_stacked_request_always_fails() {
        // 19 Comfort blocks cover 76 cells, but 25 columns of at most 3 levels hold 75.
        let config = GenerationConfig::builder().max_overall_attempts(6).build();
        let result = generate_with_config(
            RequiredCounts::new(19, 0, 0),
            &config,
            &mut ChaCha8Rng::seed_from_u64(31),
        );

        assert!(!result.success);
        assert_eq!(result.attempts_used, 6);
        assert!(result.coords.is_empty());
        assert!(result.analysis.is_none());
        assert!(!result.log.is_empty());
    }

    #[test]
    fn request_larger_than_grid_fails_in_placement() {
        let config = GenerationConfig::builder().max_overall_attempts(4).build();
        let result = generate_with_config(
            RequiredCounts::new(40, 0, 0),
            &config,
            &mut ChaCha8Rng::seed_from_u64(8),
        );

        assert!(!result.success);
        assert_eq!(result.attempts_used, 4);
        assert_eq!(result.log.len(), 4);
        assert!(result.log.iter().all(|e| e.rule == "Generation Failure"));
    }

    #[test]
    fn placement_exhaustion_is_logged_per_attempt() {
        let catalog = Catalog::default().with_grid_max(2).unwrap();
        let config = GenerationConfig::builder()
            .catalog(catalog)
            .max_overall_attempts(3)
            .max_block_retries(20)
            .build();
        let mut events = Vec::new();
        let result = generate_with_progress(
            RequiredCounts::new(3, 0, 0),
            &config,
            &mut ChaCha8Rng::seed_from_u64(1),
            |e| events.push(e.clone()),
        );

        assert!(!result.success);
        assert_eq!(result.attempts_used, 3);
        assert_eq!(result.log.len(), 3);
        assert!(result.log.iter().all(|e| e.rule == "Generation Failure"));
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            SearchEvent::AttemptRejected {
                attempt: 1,
                reason: RejectionReason::GenerationFailure
            }
        ));
        assert!(matches!(
            events[3],
            SearchEvent::Finished {
                success: false,
                attempts_used: 3
            }
        ));
    }

    #[test]
    fn rule_violations_name_the_failed_rules() {
        let config = GenerationConfig::builder().max_overall_attempts(1).build();
        let mut events = Vec::new();
        generate_with_progress(
            RequiredCounts::new(1, 0, 0),
            &config,
            &mut ChaCha8Rng::seed_from_u64(17),
            |e| events.push(e.clone()),
        );

        match &events[0] {
            SearchEvent::AttemptRejected {
                reason: RejectionReason::RuleViolation { failed_rules },
                ..
            } => assert!(failed_rules.contains(&"2.2 Min Comfort on Ground (>=2)".to_string())),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
