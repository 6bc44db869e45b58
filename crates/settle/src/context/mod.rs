//! 애플리케이션 전역 상태.
//!
//! 전역 변수 대신 하나의 컨텍스트에 모아 서버 핸들러와 폴링 루프가
//! 공유한다.

use std::sync::Arc;

use exchanges::{ExchangeApi, UpbitClient};
use sheets::{RecordStore, SheetsClient};
use tracing::info;

use crate::autotrade::AutoTrader;
use crate::monitor::{self, DepositMonitor};
use crate::notify::{Notifier, TelegramNotifier};
use crate::workflow::WorkflowEngine;

pub struct AppContext {
    pub exchange: Arc<dyn ExchangeApi>,
    pub store: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub engine: WorkflowEngine,
    pub monitor: DepositMonitor,
    pub trader: AutoTrader,
}

impl AppContext {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine: WorkflowEngine::new(store.clone()),
            monitor: DepositMonitor::new(exchange.clone()),
            trader: AutoTrader::new(exchange.clone(), notifier.clone()),
            exchange,
            store,
            notifier,
        })
    }

    /// 환경변수로 실제 업비트/구글시트/텔레그램 클라이언트를 구성한다.
    pub fn from_env() -> eyre::Result<Arc<Self>> {
        let exchange = Arc::new(UpbitClient::from_env()?);
        let store = Arc::new(SheetsClient::from_env()?);
        let notifier = Arc::new(TelegramNotifier::from_env()?);
        Ok(Self::new(exchange, store, notifier))
    }

    /// 입금 폴링 한 주기: 새 입금이면 알림을 보내고 자동 매도로 넘긴다.
    pub async fn poll_deposits(&self) {
        if let Some((event, chat_id)) = self.monitor.poll().await {
            self.notifier
                .send(chat_id, &monitor::deposit_alert(&event))
                .await;
            self.trader.on_deposit(event.net_amount, chat_id).await;
        }
    }

    /// 주문 폴링 한 주기.
    pub async fn poll_orders(&self) {
        self.trader.tick().await;
    }

    /// 종료 정리: 모니터링을 멈추고 미체결 주문을 전부 취소한다.
    pub async fn shutdown(&self) {
        if self.monitor.is_active().await {
            let _ = self.monitor.stop().await;
        }
        if self.trader.is_enabled().await {
            let _ = self.trader.disable().await;
        }
        info!("정리 완료, 종료합니다");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockExchange, RecordingNotifier};
    use sheets::MemoryStore;

    #[tokio::test]
    async fn deposit_poll_notifies_then_sells() {
        let exchange = Arc::new(MockExchange::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = AppContext::new(
            exchange.clone(),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        exchange.set_price(Some(1450.0)).await;
        ctx.monitor.start(5).await.unwrap();
        ctx.trader.enable().await;

        exchange.push_deposit("dep-1", "498", Some("2")).await;
        ctx.poll_deposits().await;

        let sent = notifier.messages().await;
        assert!(sent.iter().any(|(c, m)| *c == 5 && m.contains("새로운 USDT 입금 감지")));
        assert!(sent.iter().any(|(_, m)| m.contains("자동 판매 시작")));

        let placed = exchange.placed_orders().await;
        assert_eq!(placed.len(), 1);
        assert!((placed[0].volume - 496.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn shutdown_cancels_everything() {
        let exchange = Arc::new(MockExchange::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = AppContext::new(
            exchange.clone(),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        exchange.set_price(Some(1450.0)).await;
        ctx.monitor.start(5).await.unwrap();
        ctx.trader.enable().await;
        ctx.trader.on_deposit(100.0, 5).await;

        ctx.shutdown().await;

        assert!(!ctx.monitor.is_active().await);
        assert!(!ctx.trader.is_enabled().await);
        assert_eq!(ctx.trader.order_count().await, 0);
        assert_eq!(exchange.cancelled_orders().await.len(), 1);
    }
}
