pub mod upbit;

use async_trait::async_trait;

use interface::{Deposit, ExchangeError, Order, OrderSide, Withdrawal};

pub use upbit::UpbitClient;

/// 거래소 클라이언트 공통 인터페이스.
/// 모니터/자동거래 쪽에서 목 구현으로 대체할 수 있도록 트레이트로 분리한다.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// 입금 내역 조회 (최신순)
    async fn list_deposits(
        &self,
        currency: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Deposit>, ExchangeError>;

    /// 출금 내역 조회 (최신순)
    async fn list_withdrawals(
        &self,
        currency: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Withdrawal>, ExchangeError>;

    /// 주문 내역 조회
    async fn list_orders(
        &self,
        market: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Order>, ExchangeError>;

    /// 현재가 조회. 시세가 없으면 None.
    async fn current_price(&self, market: &str) -> Result<Option<f64>, ExchangeError>;

    /// 지정가 주문. 거래소가 주문을 거절하면 None.
    async fn place_limit_order(
        &self,
        market: &str,
        side: OrderSide,
        volume: f64,
        price: f64,
    ) -> Result<Option<Order>, ExchangeError>;

    /// 주문 단건 조회. 해당 주문이 없으면 None.
    async fn order_status(&self, uuid: &str) -> Result<Option<Order>, ExchangeError>;

    /// 주문 취소. 이미 취소되었거나 존재하지 않는 주문은 에러가 아니다.
    async fn cancel_order(&self, uuid: &str) -> Result<(), ExchangeError>;

    /// 특정 화폐 잔고 조회
    async fn balance(&self, currency: &str) -> Result<f64, ExchangeError>;
}
