//! Whole-conversation tests: convert a request, parse a reply, validate the
//! resulting calls and feed results back.

use std::sync::Arc;

use serde_json::{Value, json};
use toolshim::prelude::*;

fn tools_json() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Current weather for a city",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "location": {"type": "string", "description": "City name"},
                        "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]}
                    },
                    "required": ["location"]
                }
            }
        }
    ])
}

fn tools() -> Vec<ToolDef> {
    serde_json::from_value(tools_json()).unwrap()
}

#[test]
fn full_turn_in_every_format() {
    for format in ToolFormat::ALL {
        let pipeline = ToolPipeline::new(PipelineConfig::new(format));
        let request = json!({
            "model": "local-model",
            "temperature": 0.2,
            "tool_choice": "auto",
            "tools": tools_json(),
            "messages": [
                {"role": "system", "content": "You can use these tools:\n{{llm_tools_list}}"},
                {"role": "user", "content": "Weather in Oslo?"}
            ]
        });

        let converted = pipeline.convert_value(&request).unwrap();
        assert!(converted.get("tools").is_none(), "{format}");
        assert!(converted.get("tool_choice").is_none(), "{format}");
        assert_eq!(converted["model"], "local-model");
        assert_eq!(converted["temperature"], 0.2);
        let system = converted["messages"][0]["content"].as_str().unwrap();
        assert!(!system.contains("{{llm_tools_list}}"), "{format}");
        assert!(system.contains("get_weather"), "{format}: {system}");

        // The model answers in the format it was shown.
        let call = ToolCall::new("c", "get_weather", r#"{"location": "Oslo", "unit": "celsius"}"#);
        let reply = format!(
            "Let me check.\n{}",
            CallBuilder::new(format, format.default_markers()).build(&[call])
        );
        let (response, errors) = pipeline.extract_response(&reply);
        assert!(errors.is_empty(), "{format}: {errors:?}");
        assert_eq!(response.finish_reason, FinishReason::Tool);
        assert_eq!(response.message.text(), "Let me check.");

        let calls = response.message.tool_calls.clone().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.starts_with("call_"));
        assert!(ToolValidator.validate_call(&calls[0], &tools()).is_empty());

        // Next turn: the assistant call and its result are flattened again.
        let history = ChatRequest {
            messages: vec![
                Message::user("Weather in Oslo?"),
                response.message.clone(),
                Message::tool_result(calls[0].id.clone(), "-3C, snow"),
            ],
            tools: Some(tools()),
            ..Default::default()
        };
        let flattened = pipeline.convert(&history).unwrap();
        assert_eq!(flattened.messages.len(), 3, "{format}");
        let assistant = flattened.messages[1].text();
        assert!(assistant.starts_with("Let me check.\n"), "{format}: {assistant}");
        assert!(assistant.contains("Oslo"), "{format}: {assistant}");
        assert_eq!(flattened.messages[2].role, MessageRole::User);
        assert_eq!(flattened.messages[2].text(), "-3C, snow");

        // Rendering the flattened assistant turn and extracting it again
        // gives back the same call.
        let again = pipeline.extract(assistant);
        assert_eq!(again.calls.len(), 1, "{format}: {:?}", again.errors);
        assert_eq!(again.calls[0].arguments["location"], "Oslo");
    }
}

#[test]
fn failed_reply_gets_a_correction_prompt() {
    let config = PipelineConfig::new(ToolFormat::Markdown);
    let pipeline = ToolPipeline::new(config.clone());
    let reply = "Sure.\n# Tool Use\n### location: Oslo\n# Tool End";

    let (response, errors) = pipeline.extract_response(reply);
    assert_eq!(errors, vec![ToolError::Malformatted]);
    assert_eq!(response.message.text(), reply);
    assert_eq!(response.finish_reason, FinishReason::Stop);

    let prompt = format_extraction_failure(config.format, &config.markers(), &errors);
    assert!(prompt.contains("MALFORMATTED"));
    assert!(prompt.contains("## Name: tool_name"));

    // The corrected reply parses.
    let fixed = "# Tool Use\n## Name: get_weather\n### location: Oslo\n# Tool End";
    let (response, errors) = pipeline.extract_response(fixed);
    assert!(errors.is_empty());
    assert_eq!(response.message.tool_calls.map(|c| c.len()), Some(1));
}

#[test]
fn invalid_arguments_get_a_correction_prompt() {
    let pipeline = ToolPipeline::new(PipelineConfig::default());
    let reply = "<tool_call>\n<name>get_weather</name>\n<unit>kelvin</unit>\n<days>3</days>\n</tool_call>";
    let (response, errors) = pipeline.extract_response(reply);
    assert!(errors.is_empty());

    let call = &response.message.tool_calls.unwrap()[0];
    let violations = ToolValidator.validate_call(call, &tools());
    assert_eq!(
        violations,
        vec![
            "Missing required argument: 'location'.",
            "Argument 'unit' value 'kelvin' is not valid. Allowed: ['celsius', 'fahrenheit'].",
            "Unknown argument: 'days'.",
        ]
    );

    let prompt = format_validation_failure(&call.function.name, &call.function.arguments, &violations);
    assert!(prompt.starts_with("Tool call to 'get_weather' was rejected:"));
    assert!(prompt.contains(r#"{"unit":"kelvin","days":3}"#));
}

#[test]
fn trailing_tool_results_become_a_user_message() {
    let pipeline = ToolPipeline::new(PipelineConfig::new(ToolFormat::Json));
    let call = ToolCall::new("call_1", "get_weather", r#"{"location": "Rome"}"#);
    let request = ChatRequest {
        messages: vec![
            Message::user("Rome?"),
            Message::assistant_tool_calls(vec![call]),
            Message::tool_result("call_1", "sunny").with_name("get_weather"),
        ],
        ..Default::default()
    };
    let out = pipeline.convert(&request).unwrap();
    let last = out.messages.last().unwrap();
    assert_eq!(last.role, MessageRole::User);
    assert_eq!(last.text(), "sunny");
    assert!(last.tool_call_id.is_none());
    assert_eq!(
        out.messages[1].text(),
        "```json\n{\n    \"name\": \"get_weather\",\n    \"arguments\": {\n        \"location\": \"Rome\"\n    }\n}\n```"
    );
}

#[test]
fn unsupported_tool_choice_aborts() {
    let pipeline = ToolPipeline::new(PipelineConfig::default());
    let err = pipeline
        .convert_value(&json!({"tool_choice": "required", "messages": []}))
        .unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedToolChoice(_)));
    assert!(err.to_string().contains("'required'"));
}

#[test]
fn pipeline_is_shared_across_threads() {
    let pipeline = Arc::new(ToolPipeline::new(PipelineConfig::new(ToolFormat::Python)));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let raw = format!("<code>\nping(seq={i})\n</code>");
                let (response, errors) = pipeline.extract_response(&raw);
                assert!(errors.is_empty());
                response.message.tool_calls.unwrap()[0].function.arguments.clone()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("{{\"seq\":{i}}}"));
    }
}

#[test]
fn config_file_drives_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toolshim.json");
    std::fs::write(
        &path,
        r#"{"format": "python", "markers": {"start": "<run>", "end": "</run>"}, "schema_placeholder": "$TOOLS"}"#,
    )
    .unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    assert!(config.replace_schema_all);
    let pipeline = ToolPipeline::new(config);

    let out = pipeline
        .convert(&ChatRequest {
            messages: vec![Message::system("$TOOLS")],
            tools: Some(tools()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        out.messages[0].text(),
        "def get_weather(location: str, unit: str = None):\n    \"\"\"Current weather for a city\"\"\"\n    ..."
    );

    let (response, errors) = pipeline.extract_response("<run>\nget_weather(location='Oslo')\n</run>");
    assert!(errors.is_empty());
    assert_eq!(response.finish_reason, FinishReason::Tool);
}
