//! 텔레그램 웹훅을 받는 HTTP 서버.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::command;
use crate::context::AppContext;

/// 텔레그램 Update 중 필요한 부분만 받는다.
#[derive(Debug, Deserialize, Default)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TelegramMessage {
    pub text: Option<String>,
    pub chat: Option<TelegramChat>,
    pub from: Option<TelegramUser>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct TelegramUser {
    pub first_name: Option<String>,
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

pub async fn start_server(ctx: Arc<AppContext>, port: u16) -> eyre::Result<()> {
    let app = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "웹훅 서버 시작");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 텔레그램은 2xx 가 아니면 같은 업데이트를 재전송하므로,
/// 처리에 실패해도 200을 돌려준다.
async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    Json(update): Json<TelegramUpdate>,
) -> StatusCode {
    let Some(message) = update.message else {
        return StatusCode::OK;
    };
    let (Some(text), Some(chat)) = (message.text, message.chat) else {
        return StatusCode::OK;
    };

    let sender = message
        .from
        .and_then(|u| u.first_name)
        .unwrap_or_else(|| "Unknown".to_string());
    info!(chat_id = chat.id, %sender, "메시지 수신: {}", text.trim());

    let reply = command::handle(&ctx, chat.id, text.trim()).await;
    if reply.is_empty() {
        warn!(chat_id = chat.id, "빈 응답, 전송 생략");
        return StatusCode::OK;
    }

    ctx.notifier.send(chat.id, &reply).await;
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockExchange, RecordingNotifier};
    use sheets::MemoryStore;

    fn update(chat_id: i64, text: &str) -> TelegramUpdate {
        TelegramUpdate {
            message: Some(TelegramMessage {
                text: Some(text.to_string()),
                chat: Some(TelegramChat { id: chat_id }),
                from: None,
            }),
        }
    }

    #[tokio::test]
    async fn webhook_replies_through_notifier() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = AppContext::new(
            Arc::new(MockExchange::new()),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        let status = webhook(State(ctx), Json(update(42, "대기목록"))).await;
        assert_eq!(status, StatusCode::OK);

        let sent = notifier.messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert_eq!(sent[0].1, "대기 중인 작업이 없습니다.");
    }

    #[tokio::test]
    async fn webhook_ignores_non_text_updates() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = AppContext::new(
            Arc::new(MockExchange::new()),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        let status = webhook(State(ctx), Json(TelegramUpdate::default())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(notifier.messages().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_command_gets_fallback_reply() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = AppContext::new(
            Arc::new(MockExchange::new()),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        webhook(State(ctx), Json(update(1, "뭐해"))).await;
        let sent = notifier.messages().await;
        assert_eq!(sent[0].1, "알 수 없는 명령어입니다.");
    }
}
