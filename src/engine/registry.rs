//! Check registry.
//!
//! Holds the ordered, validated set of [`CheckDefinition`]s for each mode.
//! Order is a stable topological sort of declaration order: a check always
//! follows the checks it depends on, and otherwise keeps its declared
//! position. Loading rejects duplicate ids, unknown dependencies, invalid
//! thresholds or retry policies and dependency cycles.

use crate::checks::CheckKind;
use crate::config::ValidationConfig;
use crate::{CheckCategory, ConfigError, Mode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Warning and critical levels for a numeric observation.
///
/// A value at or above `critical` is critical; at or above `warning` (and
/// below `critical`) is a warning; anything lower is normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub warning: f64,
    pub critical: f64,
}

/// Where a value falls within a [`ThresholdBand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Normal,
    Warning,
    Critical,
}

impl ThresholdBand {
    pub const fn new(warning: f64, critical: f64) -> Self {
        ThresholdBand { warning, critical }
    }

    pub fn classify(&self, value: f64) -> Band {
        if value >= self.critical {
            Band::Critical
        } else if value >= self.warning {
            Band::Warning
        } else {
            Band::Normal
        }
    }

    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let sane = self.warning.is_finite()
            && self.critical.is_finite()
            && self.warning >= 0.0
            && self.warning <= self.critical;
        if sane {
            Ok(())
        } else {
            Err(ConfigError::InvalidThreshold {
                id: id.to_string(),
                warning: self.warning.to_string(),
                critical: self.critical.to_string(),
            })
        }
    }
}

/// Bounded exponential backoff for retryable reader errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ValidationConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based): `initial * 2^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// A single check as scheduled by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckDefinition {
    pub id: String,
    pub name: String,
    pub mode: Mode,
    pub category: CheckCategory,
    pub description: String,
    pub severity: Severity,
    pub kind: CheckKind,
    pub thresholds: Option<ThresholdBand>,
    pub retry: RetryPolicy,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Ids that must have produced a usable result before this check runs
    pub depends_on: Vec<String>,
}

impl CheckDefinition {
    /// Definition with the kind's built-in defaults.
    pub fn new(kind: CheckKind, mode: Mode) -> Self {
        CheckDefinition {
            id: kind.id().to_string(),
            name: kind.name().to_string(),
            mode,
            category: kind.category(),
            description: kind.description().to_string(),
            severity: kind.default_severity(),
            kind,
            thresholds: kind.default_thresholds(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            depends_on: kind
                .default_dependencies()
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Option<ThresholdBand>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered check definitions for both modes.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    pre: Vec<CheckDefinition>,
    post: Vec<CheckDefinition>,
}

impl CheckRegistry {
    /// Registry with no checks in either mode.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate and order a set of definitions. Definitions are split by
    /// their mode; within a mode the declaration order is kept wherever
    /// dependencies allow.
    pub fn new(definitions: Vec<CheckDefinition>) -> Result<Self, ConfigError> {
        let (pre, post): (Vec<_>, Vec<_>) =
            definitions.into_iter().partition(|d| d.mode == Mode::Pre);
        Ok(CheckRegistry {
            pre: order(pre, Mode::Pre)?,
            post: order(post, Mode::Post)?,
        })
    }

    /// The built-in catalogue for both modes with configuration applied:
    /// defaults and per-check overrides, then category, skip and enabled
    /// filtering. Dependencies on filtered checks count as satisfied.
    pub fn standard(config: &ValidationConfig) -> Result<Self, ConfigError> {
        for id in config.checks.keys() {
            if !CheckKind::ALL.iter().any(|k| k.id() == id) {
                return Err(ConfigError::UnknownCheck { id: id.clone() });
            }
        }
        for id in &config.skip_checks {
            if !CheckKind::ALL.iter().any(|k| k.id() == id) {
                warn!(check = %id, "skip list names an unknown check; ignoring");
            }
        }

        let mut definitions = Vec::with_capacity(CheckKind::ALL.len() * 2);
        for mode in [Mode::Pre, Mode::Post] {
            for kind in CheckKind::ALL {
                let def = CheckDefinition::new(kind, mode)
                    .with_retry(RetryPolicy::from_config(config))
                    .with_timeout(config.check_timeout());
                definitions.push(apply_override(def, config)?);
            }
        }

        let removed: HashSet<String> = definitions
            .iter()
            .filter(|d| !selected(d, config))
            .map(|d| d.id.clone())
            .collect();
        let definitions = definitions
            .into_iter()
            .filter(|d| !removed.contains(&d.id))
            .map(|mut d| {
                d.depends_on.retain(|dep| !removed.contains(dep));
                d
            })
            .collect();

        Self::new(definitions)
    }

    /// Ordered definitions for a mode. Deterministic for a given registry.
    pub fn definitions(&self, mode: Mode) -> &[CheckDefinition] {
        match mode {
            Mode::Pre => &self.pre,
            Mode::Post => &self.post,
        }
    }

    pub fn get(&self, mode: Mode, id: &str) -> Option<&CheckDefinition> {
        self.definitions(mode).iter().find(|d| d.id == id)
    }

    pub fn len(&self, mode: Mode) -> usize {
        self.definitions(mode).len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

fn selected(def: &CheckDefinition, config: &ValidationConfig) -> bool {
    let enabled = config
        .check_override(&def.id)
        .and_then(|ov| ov.enabled)
        .unwrap_or(true);
    enabled && config.category_selected(def.category) && !config.skip_checks.contains(&def.id)
}

fn apply_override(
    mut def: CheckDefinition,
    config: &ValidationConfig,
) -> Result<CheckDefinition, ConfigError> {
    let Some(ov) = config.check_override(&def.id) else {
        return Ok(def);
    };

    if let Some(severity) = ov.severity {
        def.severity = severity;
    }
    if ov.warning.is_some() || ov.critical.is_some() {
        // A band only means something to checks that classify a number.
        let Some(band) = def.thresholds else {
            return Err(ConfigError::InvalidThreshold {
                id: def.id.clone(),
                warning: ov.warning.map_or("-".to_string(), |v| v.to_string()),
                critical: ov.critical.map_or("-".to_string(), |v| v.to_string()),
            });
        };
        def.thresholds = Some(ThresholdBand::new(
            ov.warning.unwrap_or(band.warning),
            ov.critical.unwrap_or(band.critical),
        ));
    }
    if let Some(max_attempts) = ov.max_attempts {
        def.retry.max_attempts = max_attempts;
    }
    if let Some(secs) = ov.timeout_secs {
        def.timeout = Duration::from_secs(secs);
    }
    Ok(def)
}

/// Validate one mode's definitions and return them in execution order.
fn order(
    definitions: Vec<CheckDefinition>,
    mode: Mode,
) -> Result<Vec<CheckDefinition>, ConfigError> {
    let mut ids = HashSet::new();
    for def in &definitions {
        if !ids.insert(def.id.as_str()) {
            return Err(ConfigError::DuplicateCheck {
                id: def.id.clone(),
                mode,
            });
        }
        if let Some(band) = def.thresholds {
            band.validate(&def.id)?;
        }
        if def.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry {
                id: def.id.clone(),
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        if def.retry.initial_backoff > def.retry.max_backoff {
            return Err(ConfigError::InvalidRetry {
                id: def.id.clone(),
                reason: "initial backoff exceeds max backoff".to_string(),
            });
        }
    }
    for def in &definitions {
        if let Some(dep) = def.depends_on.iter().find(|d| !ids.contains(d.as_str())) {
            return Err(ConfigError::UnknownDependency {
                id: def.id.clone(),
                dependency: dep.clone(),
            });
        }
    }

    // Stable topological sort: repeatedly take the first declared check
    // whose dependencies are all placed.
    let mut remaining = definitions;
    let mut ordered: Vec<CheckDefinition> = Vec::with_capacity(remaining.len());
    let mut placed: HashSet<String> = HashSet::new();
    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .position(|d| d.depends_on.iter().all(|dep| placed.contains(dep)));
        match next {
            Some(pos) => {
                let def = remaining.remove(pos);
                placed.insert(def.id.clone());
                ordered.push(def);
            }
            None => {
                return Err(ConfigError::DependencyCycle {
                    ids: find_cycle(&remaining, &placed),
                })
            }
        }
    }
    Ok(ordered)
}

/// Every unplaced check has an unplaced dependency, so following the first
/// one from any check must revisit a check.
fn find_cycle(remaining: &[CheckDefinition], placed: &HashSet<String>) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let mut current = remaining.first();
    while let Some(def) = current {
        if let Some(start) = path.iter().position(|id| *id == def.id) {
            let mut cycle = path.split_off(start);
            cycle.push(def.id.clone());
            return cycle;
        }
        path.push(def.id.clone());
        current = def
            .depends_on
            .iter()
            .find(|dep| !placed.contains(*dep))
            .and_then(|dep| remaining.iter().find(|d| &d.id == dep));
    }
    path
}
