//! 업비트 USDT 입금 감시.
//!
//! 30초 주기로 최신 ACCEPTED 입금을 확인하고, 마지막으로 본 입금
//! uuid 와 다르면 새 입금 이벤트를 낸다. 시작 시점 이전의 입금은
//! uuid 를 미리 읽어 두는 것으로 무시한다.

use std::sync::Arc;

use chrono::Local;
use exchanges::ExchangeApi;
use interface::DepositEvent;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BotError;

const CURRENCY: &str = "USDT";
const ACCEPTED: &str = "ACCEPTED";

#[derive(Default)]
struct MonitorState {
    active: bool,
    chat_id: Option<i64>,
    last_seen: Option<String>,
}

pub struct DepositMonitor {
    exchange: Arc<dyn ExchangeApi>,
    state: Mutex<MonitorState>,
}

impl DepositMonitor {
    pub fn new(exchange: Arc<dyn ExchangeApi>) -> Self {
        Self {
            exchange,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// 모니터링 시작. 현재까지의 입금은 기준점으로만 쓰고 알리지 않는다.
    pub async fn start(&self, chat_id: i64) -> Result<String, BotError> {
        {
            let state = self.state.lock().await;
            if state.active {
                return Err(BotError::AlreadyActive);
            }
        }

        // 기준점: 가장 최근 입금 uuid. 조회 실패 시 첫 폴링 때 잡는다
        let seed = match self.exchange.list_deposits(CURRENCY, ACCEPTED, 1).await {
            Ok(deposits) => deposits.first().map(|d| d.uuid.clone()),
            Err(e) => {
                warn!("입금 기준점 조회 실패: {}", e);
                None
            }
        };

        let mut state = self.state.lock().await;
        state.active = true;
        state.chat_id = Some(chat_id);
        state.last_seen = seed;

        info!(chat_id, "입금 모니터링 시작");
        Ok("✅ 업비트 USDT 입금 모니터링을 시작합니다.\n새로운 입금이 감지되면 즉시 알려드립니다.".to_string())
    }

    pub async fn stop(&self) -> Result<String, BotError> {
        let mut state = self.state.lock().await;
        if !state.active {
            return Err(BotError::NotActive);
        }
        *state = MonitorState::default();

        info!("입금 모니터링 중지");
        Ok("⏸️ 입금 모니터링을 중지했습니다.".to_string())
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// 한 번의 폴링. 새 입금이 있으면 (이벤트, 알림 대상 채팅) 반환.
    /// 조회 실패는 다음 주기로 넘긴다.
    pub async fn poll(&self) -> Option<(DepositEvent, i64)> {
        let chat_id = {
            let state = self.state.lock().await;
            if !state.active {
                return None;
            }
            state.chat_id?
        };

        let deposits = match self.exchange.list_deposits(CURRENCY, ACCEPTED, 10).await {
            Ok(d) => d,
            Err(e) => {
                warn!("입금 내역 조회 실패: {}", e);
                return None;
            }
        };
        let latest = deposits.first()?;

        let mut state = self.state.lock().await;
        if !state.active {
            return None;
        }
        match &state.last_seen {
            None => {
                // 기준점이 없던 경우: 지금 것을 기준으로 삼고 알리지 않는다
                state.last_seen = Some(latest.uuid.clone());
                None
            }
            Some(seen) if *seen != latest.uuid => {
                state.last_seen = Some(latest.uuid.clone());
                info!(uuid = %latest.uuid, "새 입금 감지");
                Some((DepositEvent::from(latest), chat_id))
            }
            Some(_) => None,
        }
    }
}

/// 새 입금 알림 본문 (텔레그램 HTML).
pub fn deposit_alert(event: &DepositEvent) -> String {
    let time = event
        .done_at
        .map(|t| {
            t.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "알 수 없음".to_string());
    let txid: String = event.txid.chars().take(20).collect();

    format!(
        "🚨 <b>새로운 USDT 입금 감지!</b>\n\n\
         💰 <b>입금 금액</b>: {:.2} USDT\n\
         💸 <b>수수료</b>: {:.2} USDT\n\
         ✅ <b>실제 입금</b>: {:.2} USDT\n\
         🌐 <b>네트워크</b>: {}\n\
         ⏰ <b>입금 시간</b>: {}\n\
         🔗 <b>TxID</b>: {}...\n\n\
         입금이 완료되었습니다! 거래소에서 확인하세요.",
        event.amount, event.fee, event.net_amount, event.network, time, txid
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockExchange;

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let exchange = Arc::new(MockExchange::new());
        let monitor = DepositMonitor::new(exchange);

        monitor.start(1).await.unwrap();
        assert!(matches!(
            monitor.start(1).await.unwrap_err(),
            BotError::AlreadyActive
        ));

        monitor.stop().await.unwrap();
        assert!(matches!(
            monitor.stop().await.unwrap_err(),
            BotError::NotActive
        ));
    }

    #[tokio::test]
    async fn existing_deposits_are_not_reported() {
        let exchange = Arc::new(MockExchange::new());
        exchange.push_deposit("dep-1", "100", Some("0.5")).await;

        let monitor = DepositMonitor::new(exchange.clone());
        monitor.start(7).await.unwrap();

        // 시작 전부터 있던 입금은 무시
        assert!(monitor.poll().await.is_none());

        exchange.push_deposit("dep-2", "498", Some("2")).await;
        let (event, chat_id) = monitor.poll().await.unwrap();
        assert_eq!(chat_id, 7);
        assert!((event.net_amount - 496.0).abs() < 1e-9);

        // 같은 입금은 한 번만 알린다
        assert!(monitor.poll().await.is_none());
    }

    #[tokio::test]
    async fn inactive_monitor_never_polls() {
        let exchange = Arc::new(MockExchange::new());
        exchange.push_deposit("dep-1", "100", None).await;

        let monitor = DepositMonitor::new(exchange);
        assert!(monitor.poll().await.is_none());
    }
}
