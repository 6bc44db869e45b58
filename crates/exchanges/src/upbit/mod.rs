mod auth;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use interface::{Deposit, ExchangeError, Order, OrderSide, Withdrawal};

use crate::ExchangeApi;

pub use auth::sign_request;

const BASE_URL: &str = "https://api.upbit.com";

/// 업비트 REST 클라이언트. 모든 사설 엔드포인트는 요청별 JWT로 서명한다.
#[derive(Clone)]
pub struct UpbitClient {
    pub http: reqwest::Client,
    access_key: String,
    secret_key: String,
}

impl UpbitClient {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// 환경변수 UPBIT_ACCESS_KEY / UPBIT_SECRET_KEY에서 생성
    pub fn from_env() -> Result<Self, ExchangeError> {
        let access_key = std::env::var("UPBIT_ACCESS_KEY")
            .map_err(|_| ExchangeError::Auth("UPBIT_ACCESS_KEY not set".to_string()))?;
        let secret_key = std::env::var("UPBIT_SECRET_KEY")
            .map_err(|_| ExchangeError::Auth("UPBIT_SECRET_KEY not set".to_string()))?;
        Ok(Self::new(access_key, secret_key))
    }

    fn bearer(&self, query: Option<&str>) -> Result<String, ExchangeError> {
        let token = sign_request(&self.access_key, &self.secret_key, query)?;
        Ok(format!("Bearer {}", token))
    }

    /// 서명이 필요한 GET 요청 공통 처리
    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&str>,
    ) -> Result<T, ExchangeError> {
        let url = match query {
            Some(q) => format!("{}{}?{}", BASE_URL, endpoint, q),
            None => format!("{}{}", BASE_URL, endpoint),
        };

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer(query)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::Other(format!(
                "Upbit API error: {} {}, response: {}",
                status,
                endpoint,
                body.chars().take(200).collect::<String>()
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ExchangeError::Other(format!(
                "Failed to parse Upbit response ({}): {}, body: {}",
                endpoint,
                e,
                body.chars().take(200).collect::<String>()
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    trade_price: f64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    currency: String,
    balance: String,
}

#[async_trait]
impl ExchangeApi for UpbitClient {
    async fn list_deposits(
        &self,
        currency: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Deposit>, ExchangeError> {
        let query = format!("currency={}&state={}&limit={}", currency, state, limit);
        self.signed_get("/v1/deposits", Some(&query)).await
    }

    async fn list_withdrawals(
        &self,
        currency: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Withdrawal>, ExchangeError> {
        let query = format!("currency={}&state={}&limit={}", currency, state, limit);
        self.signed_get("/v1/withdraws", Some(&query)).await
    }

    async fn list_orders(
        &self,
        market: &str,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Order>, ExchangeError> {
        let query = format!("market={}&state={}&limit={}", market, state, limit);
        self.signed_get("/v1/orders", Some(&query)).await
    }

    async fn current_price(&self, market: &str) -> Result<Option<f64>, ExchangeError> {
        // 시세 조회는 공개 엔드포인트라 서명이 필요 없다
        let url = format!("{}/v1/ticker?markets={}", BASE_URL, market);
        let tickers: Vec<TickerResponse> = self.http.get(&url).send().await?.json().await?;
        Ok(tickers.first().map(|t| t.trade_price))
    }

    async fn place_limit_order(
        &self,
        market: &str,
        side: OrderSide,
        volume: f64,
        price: f64,
    ) -> Result<Option<Order>, ExchangeError> {
        let volume_str = volume.to_string();
        let price_str = price.to_string();
        // query_hash는 본문과 동일한 파라미터 집합으로 계산해야 한다
        let query = format!(
            "market={}&side={}&volume={}&price={}&ord_type=limit",
            market,
            side.as_str(),
            volume_str,
            price_str
        );

        let body = serde_json::json!({
            "market": market,
            "side": side.as_str(),
            "volume": volume_str,
            "price": price_str,
            "ord_type": "limit",
        });

        let response = self
            .http
            .post(format!("{}/v1/orders", BASE_URL))
            .header("Authorization", self.bearer(Some(&query))?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(
                "업비트 주문 거절: status={}, response={}",
                status,
                text.chars().take(200).collect::<String>()
            );
            return Ok(None);
        }

        let order: Order = serde_json::from_str(&text).map_err(|e| {
            ExchangeError::Other(format!("Failed to parse order response: {}", e))
        })?;
        Ok(Some(order))
    }

    async fn order_status(&self, uuid: &str) -> Result<Option<Order>, ExchangeError> {
        let query = format!("uuid={}", uuid);
        match self.signed_get::<Order>("/v1/order", Some(&query)).await {
            Ok(order) => Ok(Some(order)),
            Err(e) => {
                warn!("주문 상태 조회 실패 (uuid: {}): {}", uuid, e);
                Ok(None)
            }
        }
    }

    async fn cancel_order(&self, uuid: &str) -> Result<(), ExchangeError> {
        let query = format!("uuid={}", uuid);
        let url = format!("{}/v1/order?{}", BASE_URL, query);

        let response = self
            .http
            .delete(&url)
            .header("Authorization", self.bearer(Some(&query))?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // 이미 체결되었거나 취소된 주문도 여기로 온다. 취소는 멱등해야 하므로
            // 에러로 올리지 않고 로그만 남긴다.
            let text = response.text().await.unwrap_or_default();
            warn!(
                "주문 취소 응답 비정상 (uuid: {}): status={}, response={}",
                uuid,
                status,
                text.chars().take(200).collect::<String>()
            );
        }
        Ok(())
    }

    async fn balance(&self, currency: &str) -> Result<f64, ExchangeError> {
        let accounts: Vec<AccountResponse> = self.signed_get("/v1/accounts", None).await?;
        let balance = accounts
            .iter()
            .find(|a| a.currency == currency)
            .and_then(|a| a.balance.parse::<f64>().ok())
            .unwrap_or(0.0);
        Ok(balance)
    }
}
