use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    routing::{any, get},
    Router,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bot::Dispatcher;
use crate::config::ServerConfig;
use crate::platform::update::IncomingUpdate;

const MISSING_TOKEN_BODY: &str = "TELEGRAM_TOKEN is not set";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    /// Without a bot token nothing can be sent, so webhooks get a 500.
    bot_token_set: bool,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, bot_token_set: bool) -> Self {
        Self {
            dispatcher,
            bot_token_set,
        }
    }
}

pub fn build_router(state: AppState, webhook_path: &str) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route(webhook_path, any(webhook));
    if webhook_path != "/" {
        router = router.route("/", any(webhook));
    }
    router.with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Telegram retries any non-200 answer, so everything except a missing bot
/// token is acknowledged with `200 ok`.
async fn webhook(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if method != Method::POST {
        return (StatusCode::OK, "ok");
    }

    if !state.bot_token_set {
        return (StatusCode::INTERNAL_SERVER_ERROR, MISSING_TOKEN_BODY);
    }

    let update = match IncomingUpdate::from_json(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Dropping webhook payload: {:#}", e);
            return (StatusCode::OK, "ok");
        }
    };

    let span = info_span!("update", id = %Uuid::new_v4(), chat = ?update.chat_id());
    state.dispatcher.dispatch(update).instrument(span).await;

    (StatusCode::OK, "ok")
}

pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = build_router(state, &config.webhook_path);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    info!(
        "Listening for webhooks on {}{}",
        config.listen_addr, config.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::{BillRecord, BillStore};
    use crate::bot::WELCOME_TEXT;
    use crate::config::TelegramConfig;
    use crate::llm::{answer_header, Explainer};
    use crate::platform::{Messenger, OutgoingMessage};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<OutgoingMessage>>,
        answered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn answer_callback(&self, query_id: &str) -> anyhow::Result<()> {
            self.answered.lock().unwrap().push(query_id.to_string());
            Ok(())
        }
    }

    struct EchoExplainer;

    #[async_trait]
    impl Explainer for EchoExplainer {
        async fn explain(&self, _prompt: &str, number: &str) -> anyhow::Result<String> {
            Ok(format!("{}\n\nответ", answer_header(number)))
        }
    }

    fn app(bot_token_set: bool) -> (Router, Arc<RecordingMessenger>) {
        let store = BillStore::new(vec![
            BillRecord {
                number: "1052810-8".to_string(),
                title: "О страховых пенсиях".to_string(),
                description: "Про пенсии".to_string(),
                ..Default::default()
            },
            BillRecord {
                number: "1039977-8".to_string(),
                title: "О социальной помощи".to_string(),
                description: "Доплата к пенсии".to_string(),
                ..Default::default()
            },
        ]);
        let messenger = Arc::new(RecordingMessenger::default());
        let dispatcher = Dispatcher::new(
            Arc::new(store),
            Arc::new(EchoExplainer),
            messenger.clone(),
            &TelegramConfig::default(),
        );
        let state = AppState::new(Arc::new(dispatcher), bot_token_set);
        (build_router(state, "/api/webhook"), messenger)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_start_webhook_end_to_end() {
        let (app, messenger) = app(true);
        let resp = app
            .oneshot(post(
                "/api/webhook",
                r#"{"message": {"chat": {"id": 42}, "text": "/start"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 42);
        assert_eq!(sent[0].text, WELCOME_TEXT);
    }

    #[tokio::test]
    async fn test_root_path_also_accepts_webhooks() {
        let (app, messenger) = app(true);
        let resp = app
            .oneshot(post("/", r#"{"message": {"chat": {"id": 1}, "text": "1052810-8"}}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.starts_with("📋 **Закон № 1052810-8**"));
    }

    #[tokio::test]
    async fn test_search_webhook_end_to_end() {
        let (app, messenger) = app(true);
        let resp = app
            .oneshot(post(
                "/api/webhook",
                r#"{"message": {"chat": {"id": 3}, "text": "пенсии"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].buttons[0].callback_data, "bill:1052810-8");
        assert_eq!(sent[2].buttons[0].callback_data, "bill:1039977-8");
    }

    #[tokio::test]
    async fn test_callback_webhook_end_to_end() {
        let (app, messenger) = app(true);
        let resp = app
            .oneshot(post(
                "/api/webhook",
                r#"{"callback_query": {"id": "q1", "from": {"id": 8}, "message": {"chat": {"id": 8}}, "data": "bill:1052810-8"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(messenger.sent.lock().unwrap().len(), 1);
        assert_eq!(*messenger.answered.lock().unwrap(), vec!["q1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_returns_ok() {
        let (app, messenger) = app(true);
        let req = Request::builder()
            .method("GET")
            .uri("/api/webhook")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_returns_ok() {
        let (app, messenger) = app(true);
        let resp = app.oneshot(post("/api/webhook", "{not json")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_returns_500() {
        let (app, messenger) = app(false);
        let resp = app
            .oneshot(post(
                "/api/webhook",
                r#"{"message": {"chat": {"id": 42}, "text": "/start"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(resp).await, MISSING_TOKEN_BODY);
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_still_acks_non_post() {
        let (app, _) = app(false);
        let req = Request::builder()
            .method("GET")
            .uri("/api/webhook")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(false);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }
}
