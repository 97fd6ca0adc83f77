//! Editor tools: the registry, the on-demand lifecycle manager and the
//! built-in tool table.
//!
//! - [`ToolRegistry`]: every known tool, by name and by category.
//! - [`LifecycleManager`]: activates categories on demand, expires idle
//!   tools, and offers direct invocation without activation.
//! - [`normalize_params`]: remaps near-miss parameter keys onto a tool's
//!   declared names.

pub mod builtin;
pub mod descriptor;
pub mod handler;
pub mod lifecycle;
pub mod registry;
pub mod schema;

pub use builtin::register_builtin_tools;
pub use descriptor::ToolDescriptor;
pub use handler::{ForwardingFactory, ForwardingHandler, HandlerFactory, ToolHandler};
pub use lifecycle::{Activation, ActiveToolInfo, ChangeReason, LifecycleEvent, LifecycleManager};
pub use registry::{CategoryCatalog, ToolRegistry, ToolSummary};
pub use schema::{normalize_params, ParamType, ParameterField, ParameterSchema};
