//! Per-iteration scale recording.
//!
//! A [`MetricsSession`] is owned by the training loop. Each step it is
//! advanced with [`MetricsSession::advance_iteration`], filled by
//! [`MetricsSession::record`] during the forward pass (and by gradient hooks
//! during the backward pass), then reported with
//! [`MetricsSession::emit_report`].

use ndarray::{arr0, Array, ArrayBase, ArrayViewD, Data, Dimension};
use tracing::{debug, warn};

use crate::config::{ErrorPolicy, MetricsConfig};
use crate::error::MetricsError;
use crate::format::format_value;
use crate::hooks::{fire_all, GradientHooks};
use crate::registry::{validate_key, MetricRegistry, KEY_DELIMITER};
use crate::report::{render_lines, LogSink};
use crate::scale::{get_scale, get_scale_with_bias};
use crate::tree::build_tree;
use crate::variable::{Variable, VariableId};

/// Suffix of the entry holding a value's own scale when its gradient is tracked
pub const SCALE_SUFFIX: &str = "scale";
/// Suffix of the entry filled in once the gradient arrives
pub const GRAD_SUFFIX: &str = "grad";

/// Anything whose scale can be recorded
#[derive(Debug, Clone)]
pub enum Recordable<'a> {
    Scalar(f64),
    Array(ArrayViewD<'a, f32>),
    /// The only kind that can have its gradient tracked
    Variable(&'a Variable),
}

impl From<f64> for Recordable<'_> {
    fn from(value: f64) -> Self {
        Recordable::Scalar(value)
    }
}

impl From<f32> for Recordable<'_> {
    fn from(value: f32) -> Self {
        Recordable::Scalar(value as f64)
    }
}

impl<'a> From<ArrayViewD<'a, f32>> for Recordable<'a> {
    fn from(value: ArrayViewD<'a, f32>) -> Self {
        Recordable::Array(value)
    }
}

impl<'a, D: Dimension> From<&'a Array<f32, D>> for Recordable<'a> {
    fn from(value: &'a Array<f32, D>) -> Self {
        Recordable::Array(value.view().into_dyn())
    }
}

impl<'a> From<&'a Variable> for Recordable<'a> {
    fn from(value: &'a Variable) -> Self {
        Recordable::Variable(value)
    }
}

fn measure<S, D>(x: &ArrayBase<S, D>, bias: Option<&ArrayViewD<'_, f32>>) -> Result<f64, MetricsError>
where
    S: Data,
    S::Elem: Copy + Into<f64>,
    D: Dimension,
{
    match bias {
        Some(bias) => get_scale_with_bias(x, bias),
        None => Ok(get_scale(x)),
    }
}

pub struct MetricsSession {
    config: MetricsConfig,
    iteration: u64,
    registry: MetricRegistry,
    hooks: GradientHooks<MetricsSession>,
}

impl MetricsSession {
    pub fn new(config: MetricsConfig) -> Result<Self, MetricsError> {
        config.validate()?;
        Ok(Self {
            config,
            iteration: 0,
            registry: MetricRegistry::new(),
            hooks: GradientHooks::new(),
        })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Starts a new training step: clears every entry and any gradient hook
    /// left over from the previous step.
    pub fn advance_iteration(&mut self, iteration: u64) {
        self.registry.clear();
        let dropped = self.hooks.clear();
        if dropped > 0 {
            debug!(iteration = self.iteration, dropped, "Discarding gradient hooks that never fired");
        }
        self.iteration = iteration;
        debug!(iteration, logging = self.should_log(), "Metrics iteration advanced");
    }

    /// Whether the current iteration records scales
    pub fn should_log(&self) -> bool {
        self.config.should_log(self.iteration)
    }

    /// Records the RMS scale of `value` (plus `bias`) under `name`.
    ///
    /// With `track_gradient`, the entry is stored as `<name>.scale` and, if
    /// `value` is a [`Variable`] that requires a gradient, a hook is
    /// registered that records the gradient's scale as `<name>.grad` once
    /// [`gradient_available`](Self::gradient_available) delivers it.
    /// Does nothing on iterations where [`should_log`](Self::should_log) is false.
    pub fn record<'a>(
        &mut self,
        name: &str,
        value: impl Into<Recordable<'a>>,
        track_gradient: bool,
        bias: Option<ArrayViewD<'_, f32>>,
    ) -> Result<(), MetricsError> {
        if !self.should_log() {
            return Ok(());
        }
        validate_key(name)?;

        let value = value.into();
        let scale = match &value {
            Recordable::Scalar(x) => measure(&arr0(*x), bias.as_ref())?,
            Recordable::Array(x) => measure(x, bias.as_ref())?,
            Recordable::Variable(v) => measure(&v.value(), bias.as_ref())?,
        };

        if !track_gradient {
            return self.registry.insert(name, scale);
        }
        self.registry.insert(format!("{}{}{}", name, KEY_DELIMITER, SCALE_SUFFIX), scale)?;

        if let Recordable::Variable(v) = value {
            if v.requires_grad() {
                let grad_name = format!("{}{}{}", name, KEY_DELIMITER, GRAD_SUFFIX);
                self.hooks.subscribe(v.id(), move |session, grad| {
                    session.record(&grad_name, grad, false, None)
                });
            }
        }
        Ok(())
    }

    /// Delivers the gradient of variable `id`, firing the hooks registered
    /// for it. Returns how many hooks fired.
    pub fn gradient_available(
        &mut self,
        id: VariableId,
        grad: ArrayViewD<'_, f32>,
    ) -> Result<usize, MetricsError> {
        let hooks = self.hooks.take(id);
        fire_all(self, hooks, grad)
    }

    /// Gradient hooks registered this iteration that have not fired yet
    pub fn pending_hooks(&self) -> usize {
        self.hooks.pending()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.registry.get(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.registry.iter()
    }

    /// Formats, nests and lays out the current entries
    pub fn build_report(&self) -> Result<Vec<String>, MetricsError> {
        let config = &self.config;
        let tree = build_tree(
            self.registry
                .iter()
                .map(|(key, value)| (key, format_value(value, config.precision, config.max_leading_zeros))),
        )?;
        Ok(render_lines(&tree, config.logging_width))
    }

    /// Writes the report to `sink`, returning the number of lines written.
    ///
    /// Failures follow [`MetricsConfig::on_error`].
    pub fn emit_report<L: LogSink + ?Sized>(&self, sink: &mut L) -> Result<usize, MetricsError> {
        if self.registry.is_empty() {
            return Ok(0);
        }
        let lines = match self.build_report() {
            Ok(lines) => lines,
            Err(e) => match self.config.on_error {
                ErrorPolicy::Fail => return Err(e),
                ErrorPolicy::Skip => {
                    warn!(iteration = self.iteration, error = %e, "Skipping scale report");
                    return Ok(0);
                }
            },
        };
        debug!(iteration = self.iteration, entries = self.registry.len(), "Emitting scale report");
        for line in &lines {
            sink.log_line(line);
        }
        Ok(lines.len())
    }

    /// Takes every entry out of the session
    pub fn drain(&mut self) -> Vec<(String, f64)> {
        self.registry.drain()
    }
}
