use std::env;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tiny_scales::{MetricsConfig, MetricsSession, TracingSink, Variable};

const LEARNING_RATE: f32 = 0.05;
const BATCH_SIZE: usize = 8;

/// Dense layer with its gradient buffers
struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
    grad_weight: Array2<f32>,
    grad_bias: Array1<f32>,
}

impl Linear {
    fn new<R: Rng>(rows: usize, cols: usize, init: &Normal<f32>, rng: &mut R) -> Self {
        Self {
            weight: Array2::from_shape_fn((rows, cols), |_| init.sample(rng)),
            bias: Array1::zeros(cols),
            grad_weight: Array2::zeros((rows, cols)),
            grad_bias: Array1::zeros(cols),
        }
    }

    fn step(&mut self, lr: f32) {
        self.weight.scaled_add(-lr, &self.grad_weight);
        self.bias.scaled_add(-lr, &self.grad_bias);
    }
}

/// Two-layer ReLU network regressing random targets
struct TinyMlp {
    fc1: Linear,
    fc2: Linear,
}

impl TinyMlp {
    fn new<R: Rng>(input_dim: usize, hidden_dim: usize, output_dim: usize, rng: &mut R) -> Result<Self> {
        let init = Normal::new(0.0, 0.1)?;
        Ok(Self {
            fc1: Linear::new(input_dim, hidden_dim, &init, rng),
            fc2: Linear::new(hidden_dim, output_dim, &init, rng),
        })
    }

    /// Forward and backward pass over one batch, returning the MSE loss.
    /// Activation scales are recorded going forward; their gradients are
    /// handed to `metrics` as the backward pass produces them.
    fn train_step(
        &mut self,
        x: &Array2<f32>,
        target: &Array2<f32>,
        metrics: &mut MetricsSession,
    ) -> Result<f32> {
        // Forward
        metrics.record("fc1.weight", &self.fc1.weight, false, None)?;
        let pre1 = x.dot(&self.fc1.weight) + &self.fc1.bias;
        let h = pre1.mapv(|v| v.max(0.0));
        let hidden = Variable::with_grad(h.clone());
        metrics.record("fc1.output", &hidden, true, None)?;

        metrics.record("fc2.weight", &self.fc2.weight, false, None)?;
        let xw2 = h.dot(&self.fc2.weight);
        metrics.record("fc2.preact", &xw2, false, Some(self.fc2.bias.view().into_dyn()))?;
        let y = xw2 + &self.fc2.bias;
        let output = Variable::with_grad(y.clone());
        metrics.record("fc2.output", &output, true, None)?;

        let diff = &y - target;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(f32::NAN);
        metrics.record("loss", loss, false, None)?;

        // Backward
        let grad_y = diff.mapv(|d| 2.0 * d / y.len() as f32);
        metrics.gradient_available(output.id(), grad_y.view().into_dyn())?;
        self.fc2.grad_weight = h.t().dot(&grad_y);
        self.fc2.grad_bias = grad_y.sum_axis(Axis(0));

        let grad_h = grad_y.dot(&self.fc2.weight.t());
        metrics.gradient_available(hidden.id(), grad_h.view().into_dyn())?;
        let grad_pre1 = &grad_h * &pre1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        self.fc1.grad_weight = x.t().dot(&grad_pre1);
        self.fc1.grad_bias = grad_pre1.sum_axis(Axis(0));

        Ok(loss)
    }

    fn step(&mut self, lr: f32) {
        self.fc1.step(lr);
        self.fc2.step(lr);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let iterations: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let config = match args.get(2) {
        Some(path) => MetricsConfig::from_json_file(path)
            .with_context(|| format!("Failed to load metrics config from {}", path))?,
        None => MetricsConfig::enabled(5),
    };
    let mut metrics = MetricsSession::new(config)?;

    let mut rng = rand::thread_rng();
    let mut model = TinyMlp::new(16, 32, 4, &mut rng)?;
    let data = Normal::new(0.0f32, 1.0)?;
    let x = Array2::from_shape_fn((BATCH_SIZE, 16), |_| data.sample(&mut rng));
    let target = Array2::from_shape_fn((BATCH_SIZE, 4), |_| data.sample(&mut rng));

    let mut sink = TracingSink;
    for iteration in 0..iterations {
        metrics.advance_iteration(iteration);
        let loss = model.train_step(&x, &target, &mut metrics)?;
        model.step(LEARNING_RATE);

        if metrics.should_log() {
            info!(iteration, loss, "Training step");
            metrics.emit_report(&mut sink)?;
        }
    }

    Ok(())
}
