//! 테스트용 거래소/알림 대역.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use exchanges::ExchangeApi;
use interface::{Deposit, ExchangeError, Order, OrderSide, Withdrawal};
use tokio::sync::Mutex;

/// 기록 가능한 인메모리 거래소.
#[derive(Default)]
pub struct MockExchange {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    price: Option<f64>,
    deposits: Vec<Deposit>,
    orders: HashMap<String, Order>,
    placed: Vec<PlacedOrder>,
    cancelled: Vec<String>,
    balance: f64,
    next_id: u64,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub uuid: String,
    pub side: String,
    pub volume: f64,
    pub price: f64,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, price: Option<f64>) {
        self.inner.lock().await.price = price;
    }

    pub async fn set_balance(&self, balance: f64) {
        self.inner.lock().await.balance = balance;
    }

    /// 최신 입금이 목록 맨 앞에 온다 (실제 API와 같은 순서).
    pub async fn push_deposit(&self, uuid: &str, amount: &str, fee: Option<&str>) {
        let mut state = self.inner.lock().await;
        state.deposits.insert(
            0,
            Deposit {
                uuid: uuid.to_string(),
                currency: "USDT".to_string(),
                state: "ACCEPTED".to_string(),
                net_type: Some("TRX".to_string()),
                txid: Some(format!("tx-{}", uuid)),
                amount: amount.to_string(),
                fee: fee.map(str::to_string),
                done_at: Some(Utc::now()),
            },
        );
    }

    pub async fn mark_done(&self, uuid: &str, executed_volume: &str) {
        let mut state = self.inner.lock().await;
        if let Some(order) = state.orders.get_mut(uuid) {
            order.state = "done".to_string();
            order.executed_volume = Some(executed_volume.to_string());
        }
    }

    pub async fn placed_orders(&self) -> Vec<PlacedOrder> {
        self.inner.lock().await.placed.clone()
    }

    pub async fn cancelled_orders(&self) -> Vec<String> {
        self.inner.lock().await.cancelled.clone()
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn list_deposits(
        &self,
        _currency: &str,
        _state: &str,
        limit: u32,
    ) -> Result<Vec<Deposit>, ExchangeError> {
        let state = self.inner.lock().await;
        Ok(state.deposits.iter().take(limit as usize).cloned().collect())
    }

    async fn list_withdrawals(
        &self,
        _currency: &str,
        _state: &str,
        _limit: u32,
    ) -> Result<Vec<Withdrawal>, ExchangeError> {
        Ok(Vec::new())
    }

    async fn list_orders(
        &self,
        _market: &str,
        _state: &str,
        _limit: u32,
    ) -> Result<Vec<Order>, ExchangeError> {
        let state = self.inner.lock().await;
        Ok(state.orders.values().cloned().collect())
    }

    async fn current_price(&self, _market: &str) -> Result<Option<f64>, ExchangeError> {
        Ok(self.inner.lock().await.price)
    }

    async fn place_limit_order(
        &self,
        market: &str,
        side: OrderSide,
        volume: f64,
        price: f64,
    ) -> Result<Option<Order>, ExchangeError> {
        let mut state = self.inner.lock().await;
        state.next_id += 1;
        let uuid = format!("order-{}", state.next_id);

        let order = Order {
            uuid: uuid.clone(),
            side: side.as_str().to_string(),
            state: "wait".to_string(),
            market: market.to_string(),
            price: Some(price.to_string()),
            volume: Some(volume.to_string()),
            executed_volume: Some("0".to_string()),
            created_at: Some(Utc::now()),
        };
        state.orders.insert(uuid.clone(), order.clone());
        state.placed.push(PlacedOrder {
            uuid,
            side: side.as_str().to_string(),
            volume,
            price,
        });
        Ok(Some(order))
    }

    async fn order_status(&self, uuid: &str) -> Result<Option<Order>, ExchangeError> {
        Ok(self.inner.lock().await.orders.get(uuid).cloned())
    }

    async fn cancel_order(&self, uuid: &str) -> Result<(), ExchangeError> {
        let mut state = self.inner.lock().await;
        state.cancelled.push(uuid.to_string());
        if let Some(order) = state.orders.get_mut(uuid) {
            order.state = "cancel".to_string();
        }
        Ok(())
    }

    async fn balance(&self, _currency: &str) -> Result<f64, ExchangeError> {
        Ok(self.inner.lock().await.balance)
    }
}

/// 보낸 메시지를 쌓아 두는 알림 대역.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl crate::notify::Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) {
        self.sent.lock().await.push((chat_id, text.to_string()));
    }
}
