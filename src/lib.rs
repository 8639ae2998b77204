pub mod error;
pub use error::{MetricsError};

pub mod config;
pub use config::{ErrorPolicy, MetricsConfig};

pub mod scale;
pub use scale::{get_scale, get_scale_with_bias};

pub mod variable;
pub use variable::{Variable, VariableId};

pub mod hooks;
pub use hooks::{GradientHook, GradientHooks};

pub mod registry;
pub use registry::{MetricRegistry, KEY_DELIMITER};

pub mod tree;
pub use tree::{build_tree, MetricTree};

pub mod format;
pub use format::{format_value};

pub mod report;
pub use report::{collect_lines, render_lines, LogSink, MemorySink, ReportLine, TracingSink};

pub mod session;
pub use session::{MetricsSession, Recordable};
