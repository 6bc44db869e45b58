//! USDT 자동 매도.
//!
//! 입금 이벤트가 오면 현재가 지정가 매도 주문을 넣고, 5분 주기로
//! 체결을 확인한다. 미체결 주문은 취소 후 새 현재가로 다시 걸되
//! 재시도 횟수에 상한을 둔다.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use exchanges::ExchangeApi;
use interface::OrderSide;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::notify::Notifier;

const MARKET: &str = "KRW-USDT";
/// 미체결 주문을 갈아끼우기까지 기다리는 시간.
const ORDER_TIMEOUT_SECS: i64 = 300;
/// 재주문 상한. 넘으면 해당 입금 건의 자동 매도를 포기한다.
const MAX_RETRIES: u32 = 12;

#[derive(Debug, Clone)]
pub struct ActiveOrder {
    pub uuid: String,
    pub volume: f64,
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub initial_price: f64,
}

#[derive(Default)]
struct TradeState {
    enabled: bool,
    orders: HashMap<String, ActiveOrder>,
}

pub struct AutoTrader {
    exchange: Arc<dyn ExchangeApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<TradeState>,
}

impl AutoTrader {
    pub fn new(exchange: Arc<dyn ExchangeApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            exchange,
            notifier,
            state: Mutex::new(TradeState::default()),
        }
    }

    pub async fn enable(&self) -> String {
        let mut state = self.state.lock().await;
        if state.enabled {
            return "자동 거래가 이미 활성화되어 있습니다.".to_string();
        }
        state.enabled = true;
        info!("자동 거래 활성화");
        "✅ 자동 거래 기능을 활성화했습니다.\nUSDT 입금 시 자동으로 현재가에 판매 주문을 걸고, 5분마다 재시도합니다."
            .to_string()
    }

    /// 비활성화하면서 진행 중인 주문을 전부 취소한다.
    pub async fn disable(&self) -> String {
        let orders: Vec<ActiveOrder> = {
            let mut state = self.state.lock().await;
            if !state.enabled {
                return "자동 거래가 비활성화 상태입니다.".to_string();
            }
            state.enabled = false;
            state.orders.drain().map(|(_, o)| o).collect()
        };

        for order in orders {
            if let Err(e) = self.exchange.cancel_order(&order.uuid).await {
                warn!(uuid = %order.uuid, "주문 취소 실패: {}", e);
            }
            let short: String = order.uuid.chars().take(8).collect();
            self.notifier
                .send(order.chat_id, &format!("🛑 주문 {}... 취소됨", short))
                .await;
        }

        info!("자동 거래 비활성화");
        "⏸️ 자동 거래를 비활성화하고 모든 진행 중인 주문을 취소했습니다.".to_string()
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// 입금 이벤트 처리: 실입금 수량 전체를 현재가에 매도 주문.
    /// 실패는 채팅 알림으로 끝내고 다음 입금에 영향을 주지 않는다.
    pub async fn on_deposit(&self, net_amount: f64, chat_id: i64) {
        if !self.is_enabled().await || net_amount <= 0.0 {
            return;
        }

        let price = match self.exchange.current_price(MARKET).await {
            Ok(Some(p)) => p,
            Ok(None) | Err(_) => {
                self.notifier.send(chat_id, "⚠️ 현재가 조회 실패").await;
                return;
            }
        };

        let order = match self
            .exchange
            .place_limit_order(MARKET, OrderSide::Ask, net_amount, price)
            .await
        {
            Ok(Some(o)) => o,
            Ok(None) | Err(_) => {
                self.notifier.send(chat_id, "⚠️ 주문 생성 실패").await;
                return;
            }
        };

        {
            let mut state = self.state.lock().await;
            state.orders.insert(
                order.uuid.clone(),
                ActiveOrder {
                    uuid: order.uuid.clone(),
                    volume: net_amount,
                    chat_id,
                    created_at: Utc::now(),
                    retry_count: 0,
                    initial_price: price,
                },
            );
        }

        info!(uuid = %order.uuid, net_amount, price, "자동 매도 주문 등록");
        self.notifier
            .send(
                chat_id,
                &format!(
                    "📊 <b>USDT 자동 판매 시작</b>\n\n\
                     💵 <b>수량</b>: {:.2} USDT\n\
                     💰 <b>지정가</b>: {} 원\n\
                     ⏰ <b>주문 시각</b>: {}\n\n\
                     5분마다 체결 상태를 확인합니다.",
                    net_amount,
                    format_krw(price),
                    now_local()
                ),
            )
            .await;
    }

    /// 주기 점검. 현재 시각을 주입받아 테스트에서 시간을 움직일 수 있다.
    pub async fn tick(&self) {
        self.tick_at(Utc::now()).await;
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) {
        let orders: Vec<ActiveOrder> = {
            let state = self.state.lock().await;
            if !state.enabled || state.orders.is_empty() {
                return;
            }
            state.orders.values().cloned().collect()
        };

        for order in orders {
            let status = match self.exchange.order_status(&order.uuid).await {
                Ok(Some(s)) => s,
                Ok(None) => continue,
                Err(e) => {
                    warn!(uuid = %order.uuid, "주문 상태 조회 실패: {}", e);
                    continue;
                }
            };

            if status.is_done() {
                self.finish_order(&order, &status).await;
                continue;
            }

            let elapsed = (now - order.created_at).num_seconds();
            if elapsed >= ORDER_TIMEOUT_SECS {
                self.reprice_order(order).await;
            }
        }
    }

    async fn finish_order(&self, order: &ActiveOrder, status: &interface::Order) {
        // disable 이 먼저 지웠으면 알림도 내지 않는다
        if self.state.lock().await.orders.remove(&order.uuid).is_none() {
            return;
        }

        let price = status.price_f64();
        let volume = status.executed_volume_f64();
        let total = (price * volume).round() as i64;

        info!(uuid = %order.uuid, total, "주문 체결 완료");
        self.notifier
            .send(
                order.chat_id,
                &format!(
                    "✅ <b>주문 체결 완료!</b>\n\n\
                     💵 <b>수량</b>: {:.2} USDT\n\
                     💰 <b>체결가</b>: {} 원\n\
                     💸 <b>총액</b>: {} 원\n\
                     ⏰ <b>체결 시각</b>: {}",
                    volume,
                    format_krw(price),
                    crate::workflow::row::format_number(total),
                    now_local()
                ),
            )
            .await;
    }

    /// 시간 초과 주문 취소 후 새 현재가로 재주문.
    async fn reprice_order(&self, order: ActiveOrder) {
        // 레지스트리에서 먼저 제거. 이미 없으면 disable 과 경합한 것
        if self.state.lock().await.orders.remove(&order.uuid).is_none() {
            return;
        }

        if let Err(e) = self.exchange.cancel_order(&order.uuid).await {
            warn!(uuid = %order.uuid, "시간 초과 주문 취소 실패: {}", e);
        }
        info!(uuid = %order.uuid, retry = order.retry_count, "주문 취소 (5분 경과)");

        if order.retry_count >= MAX_RETRIES {
            self.notifier
                .send(
                    order.chat_id,
                    &format!(
                        "🛑 재시도 한도({})를 초과해 자동 매도를 중단합니다.\n수량: {:.2} USDT",
                        MAX_RETRIES, order.volume
                    ),
                )
                .await;
            return;
        }

        let price = match self.exchange.current_price(MARKET).await {
            Ok(Some(p)) => p,
            Ok(None) | Err(_) => {
                self.notifier
                    .send(order.chat_id, "⚠️ 재주문 실패: 현재가 조회 불가")
                    .await;
                return;
            }
        };

        let new_order = match self
            .exchange
            .place_limit_order(MARKET, OrderSide::Ask, order.volume, price)
            .await
        {
            Ok(Some(o)) => o,
            Ok(None) | Err(_) => {
                self.notifier.send(order.chat_id, "⚠️ 재주문 실패").await;
                return;
            }
        };

        let retry_count = order.retry_count + 1;
        {
            let mut state = self.state.lock().await;
            // 재주문 사이에 disable 됐으면 새 주문도 바로 취소한다
            if !state.enabled {
                drop(state);
                if let Err(e) = self.exchange.cancel_order(&new_order.uuid).await {
                    warn!(uuid = %new_order.uuid, "재주문 취소 실패: {}", e);
                }
                return;
            }
            state.orders.insert(
                new_order.uuid.clone(),
                ActiveOrder {
                    uuid: new_order.uuid.clone(),
                    volume: order.volume,
                    chat_id: order.chat_id,
                    created_at: Utc::now(),
                    retry_count,
                    initial_price: order.initial_price,
                },
            );
        }

        info!(uuid = %new_order.uuid, retry_count, price, "재주문 완료");
        self.notifier
            .send(
                order.chat_id,
                &format!(
                    "🔄 <b>재주문 실행</b>\n\n\
                     💵 <b>수량</b>: {:.2} USDT\n\
                     💰 <b>새 지정가</b>: {} 원\n\
                     📊 <b>재시도</b>: {}회\n\
                     ⏰ <b>재주문 시각</b>: {}",
                    order.volume,
                    format_krw(price),
                    retry_count,
                    now_local()
                ),
            )
            .await;
    }
}

fn format_krw(price: f64) -> String {
    crate::workflow::row::format_number(price.round() as i64)
}

fn now_local() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockExchange, RecordingNotifier};
    use chrono::Duration;

    fn trader() -> (Arc<MockExchange>, Arc<RecordingNotifier>, AutoTrader) {
        let exchange = Arc::new(MockExchange::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let trader = AutoTrader::new(exchange.clone(), notifier.clone());
        (exchange, notifier, trader)
    }

    #[tokio::test]
    async fn deposit_places_ask_order_at_current_price() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.enable().await;
        trader.on_deposit(496.0, 9).await;

        assert_eq!(trader.order_count().await, 1);
        let placed = exchange.placed_orders().await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, "ask");
        assert!((placed[0].volume - 496.0).abs() < 1e-9);
        assert!((placed[0].price - 1450.0).abs() < 1e-9);

        let sent = notifier.messages().await;
        assert!(sent.iter().any(|(_, m)| m.contains("자동 판매 시작")));
    }

    #[tokio::test]
    async fn disabled_trader_ignores_deposits() {
        let (exchange, _notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.on_deposit(496.0, 9).await;
        assert_eq!(trader.order_count().await, 0);
        assert!(exchange.placed_orders().await.is_empty());
    }

    #[tokio::test]
    async fn missing_price_notifies_and_skips() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(None).await;

        trader.enable().await;
        trader.on_deposit(496.0, 9).await;

        assert_eq!(trader.order_count().await, 0);
        let sent = notifier.messages().await;
        assert!(sent.iter().any(|(_, m)| m.contains("현재가 조회 실패")));
    }

    #[tokio::test]
    async fn filled_order_is_reported_and_removed() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.enable().await;
        trader.on_deposit(496.0, 9).await;
        let uuid = exchange.placed_orders().await[0].uuid.clone();

        exchange.mark_done(&uuid, "496").await;
        trader.tick().await;

        assert_eq!(trader.order_count().await, 0);
        let sent = notifier.messages().await;
        // 496 * 1450 = 719,200원
        assert!(sent
            .iter()
            .any(|(_, m)| m.contains("주문 체결 완료") && m.contains("719,200")));
    }

    #[tokio::test]
    async fn stale_order_is_repriced_after_timeout() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.enable().await;
        trader.on_deposit(496.0, 9).await;
        let first_uuid = exchange.placed_orders().await[0].uuid.clone();

        let now = Utc::now();
        // 299초: 아직 기다린다
        trader.tick_at(now + Duration::seconds(299)).await;
        assert!(exchange.cancelled_orders().await.is_empty());
        assert_eq!(exchange.placed_orders().await.len(), 1);

        // 현재가가 내려간 상태에서 300초 경과
        exchange.set_price(Some(1440.0)).await;
        trader.tick_at(now + Duration::seconds(300)).await;

        assert_eq!(exchange.cancelled_orders().await, vec![first_uuid]);
        let placed = exchange.placed_orders().await;
        assert_eq!(placed.len(), 2);
        assert!((placed[1].price - 1440.0).abs() < 1e-9);
        assert_eq!(trader.order_count().await, 1);

        let sent = notifier.messages().await;
        assert!(sent
            .iter()
            .any(|(_, m)| m.contains("재주문 실행") && m.contains("재시도</b>: 1회")));
    }

    #[tokio::test]
    async fn retry_cap_gives_up() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.enable().await;
        trader.on_deposit(496.0, 9).await;

        // 타임아웃을 13번 돌리면 12번째 재주문까지 하고 포기한다
        for i in 0..=MAX_RETRIES {
            let stale = Utc::now() + Duration::seconds(ORDER_TIMEOUT_SECS * (i as i64 + 2));
            trader.tick_at(stale).await;
        }

        assert_eq!(trader.order_count().await, 0);
        let sent = notifier.messages().await;
        assert!(sent.iter().any(|(_, m)| m.contains("자동 매도를 중단합니다")));
        // 최초 1회 + 재주문 12회
        assert_eq!(exchange.placed_orders().await.len(), 1 + MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn disable_cancels_all_open_orders() {
        let (exchange, notifier, trader) = trader();
        exchange.set_price(Some(1450.0)).await;

        trader.enable().await;
        trader.on_deposit(100.0, 1).await;
        trader.on_deposit(200.0, 2).await;
        assert_eq!(trader.order_count().await, 2);

        let msg = trader.disable().await;
        assert!(msg.contains("모든 진행 중인 주문을 취소"));
        assert_eq!(trader.order_count().await, 0);
        assert_eq!(exchange.cancelled_orders().await.len(), 2);

        let sent = notifier.messages().await;
        let cancel_notes: Vec<_> = sent
            .iter()
            .filter(|(_, m)| m.contains("취소됨"))
            .collect();
        assert_eq!(cancel_notes.len(), 2);
    }
}
