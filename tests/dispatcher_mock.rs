use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use scholar_llm::http::{
    DynHttpTransport, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport,
};
use scholar_llm::config::StaticCredentialResolver;
use scholar_llm::{
    ChatMessage, Dispatcher, LLMError, ProviderConfig, ProviderKind, ProviderSelection,
    TokenCollector, build_dispatcher_from_configs,
};
use serde_json::Value;

/// Replays one canned response and records every request it receives.
struct ScriptedTransport {
    status: u16,
    chunks: Vec<Vec<u8>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(status: u16, chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            status,
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn ok(body: &str) -> Arc<Self> {
        Self::new(200, &[body])
    }

    fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a request was sent")
    }

    fn last_body(&self) -> Value {
        serde_json::from_slice(&self.last_request().body).expect("json body")
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.requests.lock().unwrap().push(request);
        Ok(HttpResponse {
            status: self.status,
            headers: HashMap::new(),
            body: self.chunks.concat(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        self.requests.lock().unwrap().push(request);
        let chunks: Vec<Result<Vec<u8>, LLMError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(HttpStreamResponse {
            status: self.status,
            headers: HashMap::new(),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}

/// Transport whose connection always fails.
struct UnreachableTransport;

#[async_trait]
impl HttpTransport for UnreachableTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
        Err(LLMError::transport("connection refused"))
    }

    async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        Err(LLMError::transport("connection refused"))
    }
}

/// Answers with an error status whose body cannot be read.
struct BrokenBodyTransport {
    status: u16,
}

#[async_trait]
impl HttpTransport for BrokenBodyTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
        Err(LLMError::transport("reset"))
    }

    async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        let chunks: Vec<Result<Vec<u8>, LLMError>> = vec![Err(LLMError::transport("reset"))];
        Ok(HttpStreamResponse {
            status: self.status,
            headers: HashMap::from([("Retry-After".to_string(), "7".to_string())]),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}

fn dispatcher(transport: &Arc<ScriptedTransport>) -> Dispatcher {
    let transport: DynHttpTransport = transport.clone();
    Dispatcher::with_default_providers(transport)
}

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You summarise papers."),
        ChatMessage::user("First question"),
        ChatMessage::assistant("First answer"),
        ChatMessage::user("Summarise this abstract."),
    ]
}

async fn stream_with(
    transport: &Arc<ScriptedTransport>,
    provider: &str,
    messages: &[ChatMessage],
) -> TokenCollector {
    let mut collector = TokenCollector::default();
    dispatcher(transport)
        .call_llm_streaming(messages, provider, "test-key", None, &mut collector)
        .await;
    collector
}

const OPENAI_STREAM: &[&str] = &[
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi",
    "ces\":[{\"delta\":{\"content\":\"lo, \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"world\"},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
];

const ANTHROPIC_STREAM: &[&str] = &[
    "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"m\"}}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
    "event: ping\ndata: {\"type\":\"ping\"}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo, \"}}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n\n",
    "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
    "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
];

const COHERE_STREAM: &[&str] = &[
    "{\"is_finished\":false,\"event_type\":\"stream-start\",\"generation_id\":\"g\"}\n",
    "{\"is_finished\":false,\"event_type\":\"text-generation\",\"text\":\"Hel\"}\n{\"is_finished\":false,",
    "\"event_type\":\"text-generation\",\"text\":\"lo, \"}\n",
    "{\"is_finished\":false,\"event_type\":\"text-generation\",\"text\":\"world\"}\n",
    "{\"is_finished\":true,\"event_type\":\"stream-end\",\"finish_reason\":\"COMPLETE\"}\n",
];

#[tokio::test]
async fn streams_tokens_in_order_for_every_provider() {
    for (provider, chunks) in [
        ("openai", OPENAI_STREAM),
        ("anthropic", ANTHROPIC_STREAM),
        ("cohere", COHERE_STREAM),
    ] {
        let transport = ScriptedTransport::new(200, chunks);
        let collector = stream_with(&transport, provider, &conversation()).await;

        assert_eq!(collector.tokens, vec!["Hel", "lo, ", "world"], "{provider}");
        assert!(collector.completed, "{provider} should complete");
        assert!(collector.error.is_none(), "{provider} should not fail");
    }
}

#[tokio::test]
async fn streamed_text_matches_single_shot_text() {
    let cases = [
        (
            "openai",
            OPENAI_STREAM,
            r#"{"model":"gpt-4o-mini","choices":[{"message":{"role":"assistant","content":"Hello, world"},"finish_reason":"stop"}]}"#,
        ),
        (
            "anthropic",
            ANTHROPIC_STREAM,
            r#"{"model":"claude-3-5-sonnet-20241022","content":[{"type":"text","text":"Hello, world"}],"stop_reason":"end_turn"}"#,
        ),
        (
            "cohere",
            COHERE_STREAM,
            r#"{"text":"Hello, world","finish_reason":"COMPLETE"}"#,
        ),
    ];

    for (provider, chunks, single) in cases {
        let streamed = stream_with(&ScriptedTransport::new(200, chunks), provider, &conversation())
            .await
            .into_result()
            .expect("stream succeeds");

        let text = dispatcher(&ScriptedTransport::ok(single))
            .call_llm(&conversation(), provider, "test-key", None)
            .await
            .expect("single shot succeeds");

        assert_eq!(streamed, text, "{provider}");
    }
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let cases: [(&str, &[&str]); 3] = [
        (
            "openai",
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
                "data: [DONE]\n\n",
            ],
        ),
        (
            "anthropic",
            &[
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"A\"}}\n\n",
                "data: not json at all\n\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"B\"}}\n\n",
                "data: {\"type\":\"message_stop\"}\n\n",
            ],
        ),
        (
            "cohere",
            &[
                "{\"event_type\":\"text-generation\",\"text\":\"A\"}\n",
                "{\"event_type\":\"text-gener\n",
                "{\"event_type\":\"text-generation\",\"text\":\"B\"}\n",
                "{\"event_type\":\"stream-end\",\"finish_reason\":\"COMPLETE\"}\n",
            ],
        ),
    ];

    for (provider, chunks) in cases {
        let collector =
            stream_with(&ScriptedTransport::new(200, chunks), provider, &conversation()).await;
        assert_eq!(collector.tokens, vec!["A", "B"], "{provider}");
        assert!(collector.completed, "{provider}");
    }
}

#[tokio::test]
async fn single_newline_framing_keeps_every_token() {
    let cases: [(&str, &[&str]); 2] = [
        (
            "openai",
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo, \"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"world\"}}]}\n",
                "data: [DONE]\n",
            ],
        ),
        (
            "anthropic",
            &[
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n",
                "data: {oops\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"lo, \"}}\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n",
                "data: {\"type\":\"message_stop\"}\n",
            ],
        ),
    ];

    for (provider, chunks) in cases {
        let collector =
            stream_with(&ScriptedTransport::new(200, chunks), provider, &conversation()).await;
        assert_eq!(collector.tokens, vec!["Hel", "lo, ", "world"], "{provider}");
        assert!(collector.completed, "{provider}");
        assert!(collector.error.is_none(), "{provider}");
    }
}

#[tokio::test]
async fn unknown_provider_fails_in_both_modes() {
    let transport = ScriptedTransport::ok("{}");
    let dispatcher = dispatcher(&transport);

    let err = dispatcher
        .call_llm(&conversation(), "madeup", "k", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::UnknownProvider { ref provider } if provider == "madeup"));

    let mut collector = TokenCollector::default();
    dispatcher
        .call_llm_streaming(&conversation(), "madeup", "k", None, &mut collector)
        .await;
    assert!(collector.tokens.is_empty());
    assert!(!collector.completed);
    assert!(matches!(collector.error, Some(LLMError::UnknownProvider { .. })));
    assert!(transport.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn http_failures_carry_status_in_both_modes() {
    let cases = [
        ("openai", 401, r#"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"#),
        ("anthropic", 401, r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#),
        ("cohere", 500, r#"{"message":"internal server error"}"#),
    ];

    for (provider, status, body) in cases {
        let err = dispatcher(&ScriptedTransport::new(status, &[body]))
            .call_llm(&conversation(), provider, "bad-key", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(status), "{provider}");

        let collector =
            stream_with(&ScriptedTransport::new(status, &[body]), provider, &conversation()).await;
        assert!(collector.tokens.is_empty(), "{provider}");
        assert!(!collector.completed, "{provider}");
        assert_eq!(
            collector.error.as_ref().and_then(LLMError::status),
            Some(status),
            "{provider}"
        );
    }
}

#[tokio::test]
async fn unreadable_error_body_keeps_http_status() {
    let transport: DynHttpTransport = Arc::new(BrokenBodyTransport { status: 503 });
    let dispatcher = Dispatcher::with_default_providers(transport);

    for provider in ["openai", "anthropic", "cohere"] {
        let mut collector = TokenCollector::default();
        dispatcher
            .call_llm_streaming(&conversation(), provider, "k", None, &mut collector)
            .await;
        assert!(collector.tokens.is_empty(), "{provider}");
        assert!(!collector.completed, "{provider}");
        match collector.error {
            Some(LLMError::Http {
                status,
                retry_after,
                ..
            }) => {
                assert_eq!(status, 503, "{provider}");
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)), "{provider}");
            }
            other => panic!("{provider}: unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test]
async fn transport_failures_surface_as_transport_errors() {
    let transport: DynHttpTransport = Arc::new(UnreachableTransport);
    let dispatcher = Dispatcher::with_default_providers(transport);

    for provider in ["openai", "anthropic", "cohere"] {
        let err = dispatcher
            .call_llm(&conversation(), provider, "k", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Transport { .. }), "{provider}");

        let mut collector = TokenCollector::default();
        dispatcher
            .call_llm_streaming(&conversation(), provider, "k", None, &mut collector)
            .await;
        assert!(matches!(collector.error, Some(LLMError::Transport { .. })), "{provider}");
        assert!(!collector.completed);
    }
}

#[tokio::test]
async fn textless_success_yields_empty_string() {
    for (provider, body) in [
        ("openai", r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#),
        ("anthropic", r#"{"content":[],"stop_reason":"end_turn"}"#),
        ("cohere", r#"{"finish_reason":"COMPLETE"}"#),
    ] {
        let text = dispatcher(&ScriptedTransport::ok(body))
            .call_llm(&conversation(), provider, "k", None)
            .await
            .expect("success");
        assert_eq!(text, "", "{provider}");
    }
}

#[tokio::test]
async fn openai_keeps_system_message_first() {
    let transport = ScriptedTransport::ok(r#"{"choices":[]}"#);
    dispatcher(&transport)
        .call_llm(&conversation(), "openai", "sk-openai", None)
        .await
        .expect("success");

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(request.headers["Authorization"], "Bearer sk-openai");

    let body = transport.last_body();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["stream"], false);
    let roles: Vec<&str> = body["messages"]
        .as_array()
        .expect("messages")
        .iter()
        .map(|m| m["role"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(body["messages"][0]["content"], "You summarise papers.");
}

#[tokio::test]
async fn anthropic_moves_system_message_to_top_level() {
    let transport = ScriptedTransport::ok(r#"{"content":[]}"#);
    dispatcher(&transport)
        .call_llm(&conversation(), "anthropic", "sk-ant", Some("claude-3-haiku-20240307"))
        .await
        .expect("success");

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(request.headers["x-api-key"], "sk-ant");
    assert_eq!(request.headers["anthropic-version"], "2023-06-01");

    let body = transport.last_body();
    assert_eq!(body["model"], "claude-3-haiku-20240307");
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["system"], "You summarise papers.");
    let messages = body["messages"].as_array().expect("messages");
    let turns: Vec<(&str, &str)> = messages
        .iter()
        .map(|m| {
            (
                m["role"].as_str().unwrap_or_default(),
                m["content"].as_str().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        turns,
        vec![
            ("user", "First question"),
            ("assistant", "First answer"),
            ("user", "Summarise this abstract."),
        ]
    );
}

#[tokio::test]
async fn cohere_sends_only_last_user_message_and_preamble() {
    let transport = ScriptedTransport::ok(r#"{"text":"ok"}"#);
    dispatcher(&transport)
        .call_llm(&conversation(), "cohere", "co-key", None)
        .await
        .expect("success");

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.cohere.com/v1/chat");
    assert_eq!(request.headers["Authorization"], "Bearer co-key");

    let body = transport.last_body();
    assert_eq!(body["model"], "command-r-plus");
    assert_eq!(body["message"], "Summarise this abstract.");
    assert_eq!(body["preamble"], "You summarise papers.");
    assert!(body.get("chat_history").is_none());
}

#[tokio::test]
async fn streaming_requests_set_stream_flag() {
    for (provider, chunks) in [
        ("openai", OPENAI_STREAM),
        ("anthropic", ANTHROPIC_STREAM),
        ("cohere", COHERE_STREAM),
    ] {
        let transport = ScriptedTransport::new(200, chunks);
        stream_with(&transport, provider, &conversation()).await;
        assert_eq!(transport.last_body()["stream"], true, "{provider}");
    }
}

#[tokio::test]
async fn stream_without_terminal_marker_still_completes() {
    let transport = ScriptedTransport::new(
        200,
        &["data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n"],
    );
    let collector = stream_with(&transport, "openai", &conversation()).await;
    assert_eq!(collector.tokens, vec!["partial"]);
    assert!(collector.completed);
}

#[tokio::test]
async fn in_stream_error_event_reaches_on_error() {
    let transport = ScriptedTransport::new(
        200,
        &[
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        ],
    );
    let collector = stream_with(&transport, "anthropic", &conversation()).await;
    assert_eq!(collector.tokens, vec!["Hi"]);
    assert!(!collector.completed);
    assert!(matches!(collector.error, Some(LLMError::Provider { provider: "anthropic", .. })));
}

#[tokio::test]
async fn active_selection_routes_to_config_defined_ids() {
    let transport = ScriptedTransport::ok(
        r#"{"content":[{"type":"text","text":"from claude"}],"stop_reason":"end_turn"}"#,
    );
    let mut local = ProviderConfig::new("local", ProviderKind::OpenAi);
    local.base_url = Some("http://localhost:8080/v1".to_string());
    let configs = vec![ProviderConfig::new("claude", ProviderKind::Anthropic), local];
    let dynamic: DynHttpTransport = transport.clone();
    let dispatcher = build_dispatcher_from_configs(&configs, dynamic).expect("dispatcher");

    let resolver = StaticCredentialResolver::new(
        ProviderSelection::new(ProviderKind::Anthropic, "sk-ant").with_model("claude-3-haiku-20240307"),
    );
    let text = dispatcher
        .call_active(&resolver, &conversation())
        .await
        .expect("routed to the claude entry");
    assert_eq!(text, "from claude");

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(request.headers["x-api-key"], "sk-ant");
    assert_eq!(transport.last_body()["model"], "claude-3-haiku-20240307");

    let resolver = StaticCredentialResolver::new(ProviderSelection::new(ProviderKind::Cohere, "co"));
    let mut collector = TokenCollector::default();
    dispatcher
        .call_active_streaming(&resolver, &conversation(), &mut collector)
        .await;
    assert!(matches!(
        collector.error,
        Some(LLMError::UnknownProvider { ref provider }) if provider == "cohere"
    ));
}
