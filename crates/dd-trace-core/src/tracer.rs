//! The orchestrator: start/finish, parenting rules, service precedence,
//! fork detection, filters, and the handoff to the writer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dd_trace_config::TracerConfig;
use dd_trace_ids::IdGenerator;
use parking_lot::RwLock;

use crate::constants::{
    HOSTNAME_KEY, LANGUAGE_KEY, LANGUAGE_VALUE, PID_METRIC_KEY, RUNTIME_ID_KEY, VERSION_KEY,
};
use crate::context::{ActiveSpan, ContextProvider};
use crate::filters::{apply_filters, Filter};
use crate::hooks::{HookBus, HookEvent};
use crate::sampler::{DatadogSampler, PrioritySampler, Sampler};
use crate::span::Span;
use crate::trace::TraceAggregator;
use crate::types::{SamplingPriority, SpanType, TraceId};
use crate::writer::{NullWriter, Writer};

/// Which sampling strategy the tracer runs on a trace's root span.
pub enum SamplerKind {
    /// The default combined rule + rate-by-service sampler.
    Datadog(DatadogSampler),
    /// A user-supplied primary sampler, with an optional priority sampler,
    /// run through the legacy two-stage decision (see [`crate::sampler::legacy_decide`]).
    Custom {
        /// Primary keep/drop decision.
        sampler: Arc<dyn Sampler>,
        /// Optional priority adjustment.
        priority_sampler: Option<Arc<dyn PrioritySampler>>,
    },
}

/// Options accepted by [`Tracer::start_span`]. `span_type` defaults to
/// [`SpanType::Custom`] and `activate` defaults to `true`.
pub struct StartSpanOptions {
    /// The parent to attach to, if any.
    pub child_of: Option<ActiveSpan>,
    /// Explicit service name, taking precedence over parent/global.
    pub service: Option<String>,
    /// Resource name (e.g. the route template or query shape).
    pub resource: Option<String>,
    /// What kind of span this is.
    pub span_type: SpanType,
    /// Whether to publish this span via the context provider.
    pub activate: bool,
}

impl Default for StartSpanOptions {
    fn default() -> Self {
        Self {
            child_of: None,
            service: None,
            resource: None,
            span_type: SpanType::Custom,
            activate: true,
        }
    }
}

/// Orchestrates span creation/completion, sampling, context propagation,
/// fork reconciliation and the handoff to a [`Writer`].
pub struct Tracer {
    config: TracerConfig,
    id_generator: Arc<dyn IdGenerator>,
    aggregator: TraceAggregator,
    context_provider: Arc<dyn ContextProvider>,
    sampler: SamplerKind,
    writer: RwLock<Box<dyn Writer>>,
    hooks: HookBus,
    filters: RwLock<Vec<Filter>>,
    services: RwLock<HashSet<String>>,
    birth_pid: AtomicU32,
    runtime_metrics_enabled: AtomicBool,
}

impl Tracer {
    /// Builds a tracer. `writer` defaults to [`NullWriter`] if not swapped
    /// in via [`Tracer::set_writer`] before the first span finishes.
    pub fn new(
        config: TracerConfig,
        id_generator: Arc<dyn IdGenerator>,
        context_provider: Arc<dyn ContextProvider>,
        sampler: SamplerKind,
    ) -> Self {
        Self {
            config,
            id_generator,
            aggregator: TraceAggregator::new(),
            context_provider,
            sampler,
            writer: RwLock::new(Box::new(NullWriter)),
            hooks: HookBus::new(),
            filters: RwLock::new(Vec::new()),
            services: RwLock::new(HashSet::new()),
            birth_pid: AtomicU32::new(dd_trace_ids::current_pid()),
            runtime_metrics_enabled: AtomicBool::new(false),
        }
    }

    /// Installs the writer batches are handed off to.
    pub fn set_writer(&self, writer: Box<dyn Writer>) {
        *self.writer.write() = writer;
    }

    /// Registers a filter, appended to the end of the pipeline.
    pub fn add_filter(&self, filter: Filter) {
        self.filters.write().push(filter);
    }

    /// Registers a start-span hook callback.
    pub fn register_hook(&self, event: HookEvent, callback: impl Fn(&Span) + Send + Sync + 'static) {
        self.hooks.register(event, callback);
    }

    /// Enables the `language` tag on internal application root spans, as if
    /// a runtime-metrics collection loop were running. This crate does not
    /// ship that collection loop; the flag exists so embedding code that
    /// does run one can flip the gate described in the start-span algorithm.
    pub fn set_runtime_metrics_enabled(&self, enabled: bool) {
        self.runtime_metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Services this tracer has seen a span created for.
    pub fn known_services(&self) -> HashSet<String> {
        self.services.read().clone()
    }

    /// Forwards updated per-service sampling rate hints to the sampler, if
    /// it is the default [`DatadogSampler`]. A no-op for custom samplers.
    pub fn update_sampling_rates(&self, rates: std::collections::HashMap<String, f64>) {
        if let SamplerKind::Datadog(sampler) = &self.sampler {
            sampler.update_rates(rates);
        }
    }

    fn resolve_service(&self, explicit: Option<&str>, parent: Option<&Arc<Span>>) -> Option<String> {
        if let Some(s) = explicit {
            return Some(s.to_string());
        }
        if let Some(p) = parent {
            if let Some(s) = p.service() {
                return Some(s);
            }
        }
        self.config.service.clone()
    }

    /// Creates a new span per the start-span algorithm: fork detection,
    /// identity derivation, aggregator registration, root-span sampling and
    /// tag stamping, then (optionally) activation and hook dispatch.
    pub fn start_span(&self, name: impl Into<String>, opts: StartSpanOptions) -> Arc<Span> {
        self.reconcile_fork_if_needed();

        let name = name.into();
        // A trace_id of 0 is reserved and treated identically to "no parent"
        // for wire compatibility with the source's falsy-id check.
        let child_of = opts.child_of.filter(|c| !c.trace_id().is_none());

        let (trace_id, parent_id, parent_span) = match &child_of {
            None => (TraceId::new(self.id_generator.next_id()), None, None),
            Some(active) => (
                active.trace_id(),
                Some(active.span_id()),
                active.as_span().cloned(),
            ),
        };
        let span_id = crate::types::SpanId::new(self.id_generator.next_id());
        let is_root = parent_id.is_none();

        let resolved_service = self.resolve_service(opts.service.as_deref(), parent_span.as_ref());

        let span = Arc::new(Span::new(
            trace_id,
            span_id,
            parent_id,
            parent_span,
            name,
            opts.span_type,
        ));
        if span.span_type().is_internal_application_span() {
            if let Some(service) = &resolved_service {
                self.services.write().insert(service.clone());
            }
        }
        if let Some(service) = &resolved_service {
            span.set_service(service.clone());
        }
        if let Some(resource) = opts.resource {
            span.set_resource(resource);
        }

        let trace = self.aggregator.get_or_create(trace_id);
        trace.add_span(span.clone());

        if let Some(ActiveSpan::Context(ctx)) = &child_of {
            if let Some(priority) = ctx.sampling_priority {
                trace.set_sampling_decision(true, Some(SamplingPriority::from_i32(priority)));
            }
            if let Some(origin) = &ctx.dd_origin {
                trace.set_origin(origin.clone());
            }
        }

        if is_root {
            let (sampled, priority) = self.decide_sampling(&span);
            trace.set_sampling_decision(sampled, Some(priority));

            span.set_metric(PID_METRIC_KEY, self.birth_pid.load(Ordering::Relaxed) as f64);
            span.set_tag(RUNTIME_ID_KEY, dd_trace_config::runtime_id().to_string());
            if self.config.report_hostname {
                span.set_tag(HOSTNAME_KEY, dd_trace_config::hostname());
            }
            if self.runtime_metrics_enabled.load(Ordering::Relaxed)
                && span.span_type().is_internal_application_span()
            {
                span.set_tag(LANGUAGE_KEY, LANGUAGE_VALUE);
            }
        }

        for (key, value) in &self.config.tags {
            span.set_tag(key.clone(), value.clone());
        }
        if let Some(env) = &self.config.env {
            span.set_tag(crate::constants::ENV_KEY, env.clone());
        }
        self.apply_version_tag(&span, &trace, is_root);

        if opts.activate {
            self.context_provider.activate(ActiveSpan::Span(span.clone()));
        }

        self.hooks.emit(HookEvent::StartSpan, &span);

        span
    }

    fn decide_sampling(&self, root: &Span) -> (bool, SamplingPriority) {
        match &self.sampler {
            SamplerKind::Datadog(sampler) => sampler.decide(root),
            SamplerKind::Custom {
                sampler,
                priority_sampler,
            } => {
                let (sampled, priority) = crate::sampler::legacy_decide(
                    sampler.as_ref(),
                    priority_sampler.as_deref(),
                    root,
                );
                (sampled, priority.unwrap_or(SamplingPriority::AutoReject))
            }
        }
    }

    /// Version is stamped only on internal application spans, and only
    /// when this span is the trace root with a matching service, or when
    /// the trace's root span matches the configured service and already
    /// carries a version tag (letting sibling internal spans inherit it).
    fn apply_version_tag(&self, span: &Span, trace: &crate::trace::Trace, is_root: bool) {
        if !span.span_type().is_internal_application_span() {
            return;
        }
        let (Some(version), Some(cfg_service)) = (&self.config.version, &self.config.service)
        else {
            return;
        };

        if is_root {
            if span.service().as_deref() == Some(cfg_service.as_str()) {
                span.set_tag(VERSION_KEY, version.clone());
            }
            return;
        }

        if let Some(root) = trace.first_span() {
            if root.service().as_deref() == Some(cfg_service.as_str())
                && root.get_tag(VERSION_KEY).is_some()
            {
                span.set_tag(VERSION_KEY, version.clone());
            }
        }
    }

    /// Runs the finish-span algorithm. A no-op if `span` already finished.
    pub fn finish_span(&self, span: &Arc<Span>) {
        if !span.finish() {
            return;
        }

        if let Some(active) = self.context_provider.active() {
            if active.trace_id() == span.trace_id() && active.span_id() == span.span_id() {
                match span.parent() {
                    Some(parent) if !parent.is_finished() => {
                        self.context_provider.activate(ActiveSpan::Span(parent.clone()));
                    }
                    _ => self.context_provider.clear(),
                }
            }
        }

        let (trace, is_orphan) = self.aggregator.get_or_create_checked(span.trace_id());
        let flush = if is_orphan {
            tracing::warn!(
                trace_id = %span.trace_id(),
                span_id = %span.span_id(),
                "finished span whose trace was already gone; emitting a solo flush"
            );
            Some(trace.finish_orphan(span.clone()))
        } else {
            trace.finish_span(self.config.partial_flush_enabled, self.config.partial_flush_min_spans)
        };

        let Some(flush) = flush else { return };

        if flush.trace_done {
            self.aggregator.remove(span.trace_id());
        }
        if flush.spans.is_empty() || !flush.sampled {
            return;
        }
        let filtered = apply_filters(&self.filters.read(), flush.spans);
        if !filtered.is_empty() {
            self.writer.read().write(filtered);
        }
    }

    fn reconcile_fork_if_needed(&self) {
        let current = dd_trace_ids::current_pid();
        let birth = self.birth_pid.load(Ordering::Acquire);
        if current == birth {
            return;
        }
        if self
            .birth_pid
            .compare_exchange(birth, current, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        tracing::warn!(old_pid = birth, new_pid = current, "fork detected, reconciling tracer state");
        self.id_generator.reseed();
        self.aggregator.clear_all_span_lists();
        self.services.write().clear();
        {
            let mut writer = self.writer.write();
            let fresh = writer.recreate();
            *writer = fresh;
        }
        dd_trace_config::regenerate_runtime_id();
    }

    /// Initiates writer shutdown and blocks up to `timeout` for in-flight
    /// batches to flush. Idempotent, and safe to call without holding any
    /// other lock.
    pub fn shutdown(&self, timeout: Option<Duration>) {
        let writer = self.writer.read();
        writer.stop();
        writer.join(timeout);
    }
}
