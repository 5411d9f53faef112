pub mod outline;
pub mod registry;
pub mod search;
pub mod types;

pub use outline::CourseOutlineTool;
pub use registry::{Tool, ToolRegistry};
pub use search::CourseSearchTool;
pub use types::{Citation, PropertySchema, ToolDefinition, ToolInputSchema};

use crate::store::CourseIndex;
use std::sync::Arc;

/// Create a ToolRegistry with the course tools registered
pub fn create_default_registry(index: Arc<dyn CourseIndex>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CourseSearchTool::new(index.clone())));
    registry.register(Arc::new(CourseOutlineTool::new(index)));
    registry
}
