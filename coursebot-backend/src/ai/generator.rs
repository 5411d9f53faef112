use crate::ai::types::{ChatMessage, ChatRequest, ContentBlock, ModelResponse};
use crate::ai::ChatModel;
use crate::tools::{ToolDefinition, ToolRegistry};
use std::sync::Arc;

/// Default number of sequential tool-calling rounds per question
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 2;

/// Static system prompt, built once per process
const SYSTEM_PROMPT: &str = "\
You are an AI assistant specialized in course materials and educational content, \
with access to tools for course information.

Tool usage:
- Use get_course_outline for questions about course structure, lesson lists, or course overviews.
- Use search_course_content for questions about specific material within courses.
- You can make tool calls in sequence to answer complex questions, for example \
fetching a course outline first and then searching content within one of its lessons.
- Synthesize tool results into accurate, fact-based responses.
- If a tool yields no results, state this clearly without offering alternatives.

Response protocol:
- Answer general knowledge questions from existing knowledge without searching.
- Provide direct answers only; do not mention the search process or the tools.
- Keep responses brief, clear and educational, with examples where they help.";

/// Tracks state across sequential tool-calling rounds. Owned by one
/// `generate_response` invocation and discarded at exit; the transcript is
/// append-only and resent to the model in full on every round.
struct ToolRoundState {
    current_round: usize,
    max_rounds: usize,
    made_tool_calls: bool,
    messages: Vec<ChatMessage>,
}

impl ToolRoundState {
    fn new(max_rounds: usize, query: &str) -> Self {
        ToolRoundState {
            current_round: 0,
            max_rounds,
            made_tool_calls: false,
            messages: vec![ChatMessage::user(query)],
        }
    }
}

/// Drives question answering against the chat model, with optional
/// sequential tool execution bounded by a round budget.
pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        ResponseGenerator { model }
    }

    /// Generate a response to `query`, optionally with conversation history
    /// and tool support.
    ///
    /// With `tools` and a `tool_manager` present, runs up to
    /// `max_tool_rounds` rounds in which the model may request tool
    /// invocations; a round in which the model answers in plain text ends the
    /// loop early. When the budget is exhausted while the model is still
    /// requesting tools, one final call is made without any tools offered,
    /// forcing a text answer from the context gathered so far.
    ///
    /// Model transport errors propagate unmodified. Tool-level failures never
    /// abort a round: they are fed back to the model as result text.
    pub async fn generate_response(
        &self,
        query: &str,
        conversation_history: Option<&str>,
        tools: Option<Vec<ToolDefinition>>,
        tool_manager: Option<&ToolRegistry>,
        max_tool_rounds: usize,
    ) -> Result<String, String> {
        let system_content = build_system_content(conversation_history);

        match (tools, tool_manager) {
            (Some(tools), Some(manager)) if !tools.is_empty() => {
                self.generate_with_tool_rounds(query, &system_content, tools, manager, max_tool_rounds)
                    .await
            }
            (tools, manager) => {
                self.generate_single_shot(query, &system_content, tools.unwrap_or_default(), manager)
                    .await
            }
        }
    }

    /// Sequential tool-calling loop. Tools are offered on every round up to
    /// and including the last regular one; the forced final call offers none.
    async fn generate_with_tool_rounds(
        &self,
        query: &str,
        system_content: &str,
        tools: Vec<ToolDefinition>,
        manager: &ToolRegistry,
        max_rounds: usize,
    ) -> Result<String, String> {
        if max_rounds == 0 {
            return Err("max_tool_rounds must be >= 1".to_string());
        }

        let mut state = ToolRoundState::new(max_rounds, query);

        while state.current_round < state.max_rounds {
            log::info!(
                "[TOOL_LOOP] Round {}/{} starting",
                state.current_round + 1,
                state.max_rounds
            );

            let response = self
                .model
                .complete(ChatRequest {
                    system: system_content.to_string(),
                    messages: state.messages.clone(),
                    tools: tools.clone(),
                })
                .await?;

            if !response.is_tool_use() {
                // Normal, earliest-possible termination
                return extract_final_text(&response);
            }

            self.process_tool_calls(&response, &mut state, manager).await;
            state.current_round += 1;
        }

        // Budget exhausted while the model was still requesting tools: force
        // a text answer by offering no tools on the final call.
        log::info!(
            "[TOOL_LOOP] Round budget exhausted after {} round(s) (tool calls made: {}), forcing final answer",
            state.current_round,
            state.made_tool_calls
        );

        let final_response = self
            .model
            .complete(ChatRequest {
                system: system_content.to_string(),
                messages: state.messages.clone(),
                tools: Vec::new(),
            })
            .await?;

        extract_final_text(&final_response)
    }

    /// Single call without tool support. If the model nonetheless requests a
    /// tool and a manager is available, the requests are executed exactly
    /// once and one follow-up call (without tools) produces the answer;
    /// a tool request with no manager present is a caller contract violation.
    async fn generate_single_shot(
        &self,
        query: &str,
        system_content: &str,
        tools: Vec<ToolDefinition>,
        manager: Option<&ToolRegistry>,
    ) -> Result<String, String> {
        let mut messages = vec![ChatMessage::user(query)];

        let response = self
            .model
            .complete(ChatRequest {
                system: system_content.to_string(),
                messages: messages.clone(),
                tools,
            })
            .await?;

        if !response.is_tool_use() {
            return extract_final_text(&response);
        }

        let manager = manager.ok_or_else(|| {
            "Model requested a tool but no tool manager is configured".to_string()
        })?;

        messages.push(ChatMessage::assistant_blocks(response.content.clone()));
        let results = execute_tool_requests(&response, manager).await;
        if !results.is_empty() {
            messages.push(ChatMessage::user_with_tool_results(results));
        }

        let final_response = self
            .model
            .complete(ChatRequest {
                system: system_content.to_string(),
                messages,
                tools: Vec::new(),
            })
            .await?;

        extract_final_text(&final_response)
    }

    /// Execute every tool request in `response` and append the assistant turn
    /// plus one combined result message to the transcript.
    async fn process_tool_calls(
        &self,
        response: &ModelResponse,
        state: &mut ToolRoundState,
        manager: &ToolRegistry,
    ) {
        state
            .messages
            .push(ChatMessage::assistant_blocks(response.content.clone()));

        let results = execute_tool_requests(response, manager).await;
        if !results.is_empty() {
            state.messages.push(ChatMessage::user_with_tool_results(results));
            state.made_tool_calls = true;
        }
    }
}

/// Run the tool requests of a model response in the order the model listed
/// them, converting tool-level failures into result text so the model can
/// keep synthesizing despite partial information.
async fn execute_tool_requests(
    response: &ModelResponse,
    manager: &ToolRegistry,
) -> Vec<ContentBlock> {
    let mut results = Vec::new();

    for block in &response.content {
        if let ContentBlock::ToolUse { id, name, input } = block {
            log::info!("[TOOL_LOOP] Executing tool '{}'", name);
            let content = match manager.execute_tool(name, input.clone()).await {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("[TOOL_LOOP] Tool '{}' failed: {}", name, e);
                    format!("Tool execution failed: {}", e)
                }
            };
            results.push(ContentBlock::tool_result(id.clone(), content));
        }
    }

    results
}

/// First text block of the response; an empty response is a hard error, we
/// never synthesize placeholder text for it.
fn extract_final_text(response: &ModelResponse) -> Result<String, String> {
    response
        .first_text()
        .map(String::from)
        .ok_or_else(|| "Model returned an empty response".to_string())
}

/// Combine the static instruction prompt with optional pre-rendered history
fn build_system_content(conversation_history: Option<&str>) -> String {
    match conversation_history {
        Some(history) if !history.is_empty() => {
            format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, history)
        }
        _ => SYSTEM_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{MessageContent, StopReason};
    use crate::tools::{Citation, PropertySchema, Tool, ToolInputSchema};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted model: pops pre-baked responses and records every request
    struct ScriptedModel {
        responses: Mutex<Vec<ModelResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(mut responses: Vec<ModelResponse>) -> Self {
            responses.reverse();
            ScriptedModel {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn request(&self, index: usize) -> ChatRequest {
            self.requests.lock()[index].clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: ChatRequest) -> Result<ModelResponse, String> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop()
                .ok_or_else(|| "scripted model ran out of responses".to_string())
        }
    }

    /// Model that always fails, for transport-error propagation
    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ModelResponse, String> {
            Err("Anthropic API request failed: connection refused".to_string())
        }
    }

    struct CountingTool {
        name: &'static str,
        reply: Result<&'static str, &'static str>,
        invocations: AtomicUsize,
    }

    impl CountingTool {
        fn ok(name: &'static str, reply: &'static str) -> Self {
            CountingTool {
                name,
                reply: Ok(reply),
                invocations: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str, cause: &'static str) -> Self {
            CountingTool {
                name,
                reply: Err(cause),
                invocations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn definition(&self) -> ToolDefinition {
            let mut properties = HashMap::new();
            properties.insert("query".to_string(), PropertySchema::string("query"));
            ToolDefinition {
                name: self.name.to_string(),
                description: "test tool".to_string(),
                input_schema: ToolInputSchema::object(properties, vec!["query"]),
            }
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.reply.map(String::from).map_err(String::from)
        }

        fn last_sources(&self) -> Vec<Citation> {
            Vec::new()
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
        }
    }

    fn tool_use_response(id: &str, name: &str, input: Value) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    fn registry_with(tools: Vec<std::sync::Arc<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    fn result_blocks(message: &ChatMessage) -> Vec<ContentBlock> {
        match &message.content {
            MessageContent::Blocks(blocks) => blocks.clone(),
            MessageContent::Text(_) => panic!("expected block content"),
        }
    }

    #[tokio::test]
    async fn test_plain_text_first_response_is_single_call() {
        let model = Arc::new(ScriptedModel::new(vec![text_response("Paris.")]));
        let registry = registry_with(vec![Arc::new(CountingTool::ok("search_course_content", ""))]);
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "What is the capital of France?",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                5,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Paris.");
        assert_eq!(model.call_count(), 1);
        assert!(!model.request(0).tools.is_empty());
    }

    #[tokio::test]
    async fn test_tool_round_then_text_answer() {
        let tool = Arc::new(CountingTool::ok("search_course_content", "passage text"));
        let registry = registry_with(vec![tool.clone()]);
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use_response("toolu_1", "search_course_content", json!({"query": "variables"})),
            text_response("Answer."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "What are variables?",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Answer.");
        assert_eq!(model.call_count(), 2);
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 1);

        // Round 2 sees the full transcript: question, assistant tool use,
        // combined tool-result message with the echoed correlation id
        let second = model.request(1);
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, "assistant");
        assert_eq!(second.messages[2].role, "user");
        let results = result_blocks(&second.messages[2]);
        assert_eq!(
            results[0],
            ContentBlock::tool_result("toolu_1", "passage text")
        );
        // Tools are still offered on the second regular round
        assert!(!second.tools.is_empty());
    }

    #[tokio::test]
    async fn test_round_budget_forces_final_toolless_call() {
        let tool = Arc::new(CountingTool::ok("search_course_content", "found"));
        let registry = registry_with(vec![tool.clone()]);
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use_response("toolu_1", "search_course_content", json!({"query": "a"})),
            tool_use_response("toolu_2", "search_course_content", json!({"query": "b"})),
            text_response("Forced answer."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "Compare lesson 1 and lesson 2",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Forced answer.");
        // 2 regular rounds with tools + 1 forced call without
        assert_eq!(model.call_count(), 3);
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 2);
        assert!(!model.request(0).tools.is_empty());
        assert!(!model.request(1).tools.is_empty());
        assert!(model.request(2).tools.is_empty());
    }

    #[tokio::test]
    async fn test_single_round_budget_with_tools() {
        let tool = Arc::new(CountingTool::ok("search_course_content", "found"));
        let registry = registry_with(vec![tool.clone()]);
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use_response("toolu_1", "search_course_content", json!({"query": "a"})),
            text_response("Answer."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "What are variables?",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                1,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Answer.");
        assert_eq!(model.call_count(), 2);
        assert!(!model.request(0).tools.is_empty());
        assert!(model.request(1).tools.is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_is_absorbed_not_fatal() {
        let tool = Arc::new(CountingTool::failing(
            "search_course_content",
            "index unavailable",
        ));
        let registry = registry_with(vec![tool.clone()]);
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use_response("toolu_9", "search_course_content", json!({"query": "x"})),
            text_response("Partial answer."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Partial answer.");
        assert_eq!(model.call_count(), 2);

        let results = result_blocks(&model.request(1).messages[2]);
        assert_eq!(
            results[0],
            ContentBlock::tool_result("toolu_9", "Tool execution failed: index unavailable")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_name_fed_back_as_result_text() {
        let registry = registry_with(vec![Arc::new(CountingTool::ok("search_course_content", ""))]);
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use_response("toolu_1", "get_course_outline", json!({"course_name": "MCP"})),
            text_response("Answer without outline."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Answer without outline.");
        let results = result_blocks(&model.request(1).messages[2]);
        assert_eq!(
            results[0],
            ContentBlock::tool_result("toolu_1", "Tool 'get_course_outline' not found")
        );
    }

    #[tokio::test]
    async fn test_multiple_tool_requests_in_one_round() {
        let search = Arc::new(CountingTool::ok("search_course_content", "searched"));
        let outline = Arc::new(CountingTool::ok("get_course_outline", "outlined"));
        let registry = registry_with(vec![search.clone(), outline.clone()]);

        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse {
                content: vec![
                    ContentBlock::ToolUse {
                        id: "toolu_a".to_string(),
                        name: "get_course_outline".to_string(),
                        input: json!({"course_name": "MCP"}),
                    },
                    ContentBlock::ToolUse {
                        id: "toolu_b".to_string(),
                        name: "search_course_content".to_string(),
                        input: json!({"query": "variables"}),
                    },
                ],
                stop_reason: StopReason::ToolUse,
            },
            text_response("Combined answer."),
        ]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Combined answer.");
        assert_eq!(search.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(outline.invocations.load(Ordering::SeqCst), 1);

        // Both results land in one combined user message, in request order
        let results = result_blocks(&model.request(1).messages[2]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], ContentBlock::tool_result("toolu_a", "outlined"));
        assert_eq!(results[1], ContentBlock::tool_result("toolu_b", "searched"));
    }

    #[tokio::test]
    async fn test_tool_request_without_manager_is_contract_violation() {
        let registry = registry_with(vec![Arc::new(CountingTool::ok("search_course_content", ""))]);
        let model = Arc::new(ScriptedModel::new(vec![tool_use_response(
            "toolu_1",
            "search_course_content",
            json!({"query": "x"}),
        )]));
        let generator = ResponseGenerator::new(model.clone());

        let err = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                None,
                2,
            )
            .await
            .unwrap_err();

        assert!(err.contains("no tool manager"));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_tools_is_plain_single_call() {
        let model = Arc::new(ScriptedModel::new(vec![text_response("Plain answer.")]));
        let generator = ResponseGenerator::new(model.clone());

        let answer = generator
            .generate_response("question", None, None, None, 2)
            .await
            .unwrap();

        assert_eq!(answer, "Plain answer.");
        assert_eq!(model.call_count(), 1);
        assert!(model.request(0).tools.is_empty());
    }

    #[tokio::test]
    async fn test_model_transport_error_propagates() {
        let registry = registry_with(vec![Arc::new(CountingTool::ok("search_course_content", ""))]);
        let generator = ResponseGenerator::new(Arc::new(FailingModel));

        let err = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                2,
            )
            .await
            .unwrap_err();

        assert!(err.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_response_is_hard_error() {
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse {
            content: vec![],
            stop_reason: StopReason::EndTurn,
        }]));
        let generator = ResponseGenerator::new(model);

        let err = generator
            .generate_response("question", None, None, None, 2)
            .await
            .unwrap_err();

        assert!(err.contains("empty response"));
    }

    #[tokio::test]
    async fn test_zero_round_budget_rejected() {
        let registry = registry_with(vec![Arc::new(CountingTool::ok("search_course_content", ""))]);
        let generator = ResponseGenerator::new(Arc::new(FailingModel));

        let err = generator
            .generate_response(
                "question",
                None,
                Some(registry.get_tool_definitions()),
                Some(&registry),
                0,
            )
            .await
            .unwrap_err();

        assert!(err.contains("max_tool_rounds"));
    }

    #[tokio::test]
    async fn test_history_included_under_separator() {
        let model = Arc::new(ScriptedModel::new(vec![text_response("With context.")]));
        let generator = ResponseGenerator::new(model.clone());

        generator
            .generate_response(
                "Can you elaborate?",
                Some("User: What is MCP?\nAssistant: A protocol."),
                None,
                None,
                2,
            )
            .await
            .unwrap();

        let system = model.request(0).system;
        assert!(system.contains("Previous conversation:\nUser: What is MCP?"));
    }

    #[tokio::test]
    async fn test_no_history_keeps_prompt_untouched() {
        let model = Arc::new(ScriptedModel::new(vec![text_response("ok")]));
        let generator = ResponseGenerator::new(model.clone());

        generator
            .generate_response("question", None, None, None, 2)
            .await
            .unwrap();

        assert!(!model.request(0).system.contains("Previous conversation:"));
    }
}
