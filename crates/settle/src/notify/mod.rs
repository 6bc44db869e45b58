//! 텔레그램 알림 전송.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

/// 사용자 알림 전송 인터페이스. 전송 실패는 로그만 남기고 삼킨다.
/// 알림이 본 작업 흐름을 깨면 안 되기 때문이다.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str);
}

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    pub fn from_env() -> eyre::Result<Self> {
        let token = std::env::var("BOT_TOKEN")
            .map_err(|_| eyre::eyre!("BOT_TOKEN 환경변수가 필요합니다"))?;
        Ok(Self::new(token))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.http.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(chat_id, "텔레그램 메시지 전송 완료");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(
                    chat_id,
                    %status,
                    "텔레그램 메시지 전송 실패: {}",
                    body.chars().take(200).collect::<String>()
                );
            }
            Err(e) => {
                warn!(chat_id, "텔레그램 메시지 전송 오류: {}", e);
            }
        }
    }
}
