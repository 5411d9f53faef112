use crate::store::CourseIndex;
use crate::tools::registry::Tool;
use crate::tools::types::{Citation, PropertySchema, ToolDefinition, ToolInputSchema};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Returns the structure of a named course: title, link, instructor and the
/// complete lesson list
pub struct CourseOutlineTool {
    index: Arc<dyn CourseIndex>,
    definition: ToolDefinition,
    last_sources: Mutex<Vec<Citation>>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<dyn CourseIndex>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "course_name".to_string(),
            PropertySchema::string(
                "Course title to get the outline for (partial matches work)",
            ),
        );

        CourseOutlineTool {
            index,
            definition: ToolDefinition {
                name: "get_course_outline".to_string(),
                description:
                    "Get course outline including title, course link, and complete lesson list"
                        .to_string(),
                input_schema: ToolInputSchema::object(properties, vec!["course_name"]),
            },
            last_sources: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        self.last_sources.lock().clear();

        // Missing parameter is a validation message the model can retry on,
        // not a tool failure
        let course_name = match args.get("course_name").and_then(|v| v.as_str()) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Ok("Error: course_name parameter is required".to_string()),
        };

        let title = match self.index.resolve_course_name(&course_name) {
            Some(title) => title,
            None => return Ok(format!("No course found matching '{}'", course_name)),
        };

        let course = self
            .index
            .get_all_courses_metadata()
            .into_iter()
            .find(|c| c.title == title);

        let course = match course {
            Some(course) => course,
            None => return Ok(format!("Course metadata not found for '{}'", title)),
        };

        let mut outline = format!("**Course:** {}\n", course.title);
        if let Some(ref link) = course.course_link {
            outline.push_str(&format!("**Course Link:** {}\n", link));
        }
        if let Some(ref instructor) = course.instructor {
            outline.push_str(&format!("**Instructor:** {}\n", instructor));
        }

        outline.push_str(&format!("\n**Lessons ({} total):**\n", course.lessons.len()));
        for lesson in &course.lessons {
            outline.push_str(&format!("{}. {}\n", lesson.lesson_number, lesson.title));
        }

        *self.last_sources.lock() =
            vec![Citation::new(course.title.clone(), course.course_link.clone())];

        Ok(outline.trim_end().to_string())
    }

    fn last_sources(&self) -> Vec<Citation> {
        self.last_sources.lock().clone()
    }

    fn reset_sources(&self) {
        self.last_sources.lock().clear();
    }
}
