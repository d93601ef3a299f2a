//! Root-span sampling: a primary keep/drop decision plus an optional
//! priority adjustment that propagates to distributed peers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::span::Span;
use crate::types::SamplingPriority;

/// Decides whether a trace is kept, based on its root span.
pub trait Sampler: Send + Sync {
    /// Returns `true` if the trace rooted at `root` should be kept.
    fn sample(&self, root: &Span) -> bool;
}

/// Adjusts the distributed sampling priority after the primary decision.
pub trait PrioritySampler: Send + Sync {
    /// Returns the priority to stamp on the trace, given the primary
    /// sampler's keep/drop decision.
    fn priority_for(&self, root: &Span, kept: bool) -> SamplingPriority;
}

/// A single glob-style sampling rule: matches on service and/or span name,
/// falling through to the next rule (or the global rate) when either
/// pattern is set but does not match.
#[derive(Clone, Debug)]
pub struct SamplingRule {
    /// Service glob; `None` matches any service.
    pub service: Option<String>,
    /// Span-name glob; `None` matches any name.
    pub name: Option<String>,
    /// Fraction in `[0.0, 1.0]` of matching traces to keep.
    pub sample_rate: f64,
}

impl SamplingRule {
    fn matches(&self, root: &Span) -> bool {
        let service_ok = self
            .service
            .as_ref()
            .map(|pat| glob_match(pat, root.service().as_deref().unwrap_or("")))
            .unwrap_or(true);
        let name_ok = self
            .name
            .as_ref()
            .map(|pat| glob_match(pat, root.name()))
            .unwrap_or(true);
        service_ok && name_ok
    }
}

/// Minimal `*`-only glob matcher, sufficient for service/name rule patterns.
fn glob_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else if let Some(pos) = rest.find(part) {
            rest = &rest[pos + part.len()..];
        } else {
            return false;
        }
    }
    true
}

/// Hashes a trace id deterministically into `[0, 1)`, used so the same trace
/// always resolves to the same keep/drop decision for a given rate.
fn deterministic_fraction(trace_id: u64, rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    // Knuth multiplicative hash, same family used by the source tracer for
    // rate-based sampling so retries of the same trace resolve consistently.
    const KNUTH_FACTOR: u64 = 1_111_111_111_111_111_111;
    let hashed = trace_id.wrapping_mul(KNUTH_FACTOR);
    (hashed as f64 / u64::MAX as f64) < rate
}

/// Matches span/service/name rules against per-rule rates, falling back to a
/// global rate when nothing matches.
pub struct RuleBasedSampler {
    rules: Vec<SamplingRule>,
    default_rate: f64,
}

impl RuleBasedSampler {
    /// Builds a sampler from an ordered rule list plus a global fallback rate.
    pub fn new(rules: Vec<SamplingRule>, default_rate: f64) -> Self {
        Self { rules, default_rate }
    }

    /// A sampler that keeps everything, for local development and tests.
    pub fn keep_all() -> Self {
        Self::new(Vec::new(), 1.0)
    }
}

impl Sampler for RuleBasedSampler {
    fn sample(&self, root: &Span) -> bool {
        let rate = self
            .rules
            .iter()
            .find(|rule| rule.matches(root))
            .map(|rule| rule.sample_rate)
            .unwrap_or(self.default_rate);
        deterministic_fraction(root.trace_id().as_u64(), rate)
    }
}

/// Stamps the applied sample rate onto kept spans so the backend can scale
/// trace counts back up to an estimate of the true volume.
pub struct RateSampler {
    rate: f64,
}

impl RateSampler {
    /// Builds a rate sampler for the given fraction in `[0.0, 1.0]`.
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl PrioritySampler for RateSampler {
    fn priority_for(&self, root: &Span, kept: bool) -> SamplingPriority {
        if kept {
            root.set_metric(crate::constants::SAMPLE_RATE_METRIC_KEY, self.rate);
            SamplingPriority::AutoKeep
        } else {
            SamplingPriority::AutoReject
        }
    }
}

/// Maintains a table of per-service sampling rates, refreshed from writer
/// feedback when the agent returns updated rate hints.
pub struct RateByServiceSampler {
    rates: RwLock<HashMap<String, f64>>,
    default_rate: f64,
}

impl RateByServiceSampler {
    /// Builds a sampler with an initial default rate applied to any service
    /// the agent has not yet sent a rate hint for.
    pub fn new(default_rate: f64) -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
            default_rate,
        }
    }

    /// Replaces the rate table with fresh hints from the agent, keyed
    /// `service,env` the way the wire protocol reports them.
    pub fn update_rates(&self, rates: HashMap<String, f64>) {
        *self.rates.write() = rates;
    }

    fn rate_for(&self, service_env_key: &str) -> f64 {
        self.rates
            .read()
            .get(service_env_key)
            .copied()
            .unwrap_or(self.default_rate)
    }
}

impl PrioritySampler for RateByServiceSampler {
    fn priority_for(&self, root: &Span, kept: bool) -> SamplingPriority {
        if !kept {
            return SamplingPriority::AutoReject;
        }
        let key = root.service().unwrap_or_default();
        let rate = self.rate_for(&key);
        deterministic_fraction(root.trace_id().as_u64().wrapping_add(1), rate)
            .then_some(SamplingPriority::AutoKeep)
            .unwrap_or(SamplingPriority::AutoReject)
    }
}

/// The default combined sampler: a [`RuleBasedSampler`] primary decision
/// feeding a [`RateByServiceSampler`] priority adjustment.
///
/// At flush time every trace `sampled` is always `true` (so the agent
/// receives it either way); the keep/drop outcome is communicated purely
/// through `priority` (`AutoKeep` vs `AutoReject`) so the agent can make the
/// final call with full visibility into volume.
pub struct DatadogSampler {
    rule_sampler: RuleBasedSampler,
    rate_sampler: RateByServiceSampler,
}

impl DatadogSampler {
    /// Builds the combined sampler from its two stages.
    pub fn new(rule_sampler: RuleBasedSampler, rate_sampler: RateByServiceSampler) -> Self {
        Self {
            rule_sampler,
            rate_sampler,
        }
    }

    /// Runs both stages and returns `(sampled, priority)` for the trace
    /// rooted at `root`, per the combined-decision rule in the sampler
    /// design: `sampled` is unconditionally `true`, and `priority` reflects
    /// whether the rule sampler would have kept it.
    pub fn decide(&self, root: &Span) -> (bool, SamplingPriority) {
        let kept = self.rule_sampler.sample(root);
        let priority = self.rate_sampler.priority_for(root, kept);
        (true, priority)
    }

    /// Forwards updated per-service rate hints to the inner rate sampler.
    pub fn update_rates(&self, rates: HashMap<String, f64>) {
        self.rate_sampler.update_rates(rates);
    }
}

impl Default for DatadogSampler {
    fn default() -> Self {
        Self::new(RuleBasedSampler::keep_all(), RateByServiceSampler::new(1.0))
    }
}

/// Runs the legacy two-stage decision for a user-supplied [`Sampler`] that
/// is not [`DatadogSampler`]: primary decides `sampled`, and an optional
/// priority sampler only ever upgrades a kept trace, never a dropped one.
pub fn legacy_decide(
    sampler: &dyn Sampler,
    priority_sampler: Option<&dyn PrioritySampler>,
    root: &Span,
) -> (bool, Option<SamplingPriority>) {
    let kept = sampler.sample(root);
    if !kept {
        let priority = priority_sampler.map(|_| SamplingPriority::AutoReject);
        return (false, priority);
    }
    let priority = priority_sampler.map(|p| p.priority_for(root, true));
    (true, priority)
}
