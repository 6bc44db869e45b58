use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 주문 방향. 업비트 표기("bid"/"ask")를 그대로 따른다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// 매수
    Bid,
    /// 매도
    Ask,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Bid => "bid",
            OrderSide::Ask => "ask",
        }
    }
}

/// 거래소 입금 내역 한 건 (업비트 /v1/deposits 응답)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub uuid: String,
    pub currency: String,
    /// 입금 상태 (예: "ACCEPTED")
    pub state: String,
    /// 네트워크 타입 (예: "TRX")
    pub net_type: Option<String>,
    pub txid: Option<String>,
    /// 입금 수량 (숫자 문자열)
    pub amount: String,
    /// 입금 수수료 (숫자 문자열)
    pub fee: Option<String>,
    pub done_at: Option<DateTime<Utc>>,
}

impl Deposit {
    pub fn amount_f64(&self) -> f64 {
        self.amount.parse().unwrap_or(0.0)
    }

    pub fn fee_f64(&self) -> f64 {
        self.fee
            .as_deref()
            .and_then(|f| f.parse().ok())
            .unwrap_or(0.0)
    }

    /// 수수료 차감 후 실입금량
    pub fn net_amount(&self) -> f64 {
        self.amount_f64() - self.fee_f64()
    }
}

/// 거래소 출금 내역 한 건 (업비트 /v1/withdraws 응답)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub uuid: String,
    pub currency: String,
    pub state: String,
    pub amount: String,
    pub fee: Option<String>,
    pub done_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    pub fn amount_f64(&self) -> f64 {
        self.amount.parse().unwrap_or(0.0)
    }
}

/// 거래소 주문 한 건 (업비트 /v1/order, /v1/orders 응답)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub uuid: String,
    /// "bid" 또는 "ask"
    pub side: String,
    /// 주문 상태: "wait", "done", "cancel"
    pub state: String,
    pub market: String,
    /// 지정가 (숫자 문자열)
    pub price: Option<String>,
    /// 주문 수량 (숫자 문자열)
    pub volume: Option<String>,
    /// 체결된 수량 (숫자 문자열)
    pub executed_volume: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn price_f64(&self) -> f64 {
        self.price
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0)
    }

    pub fn volume_f64(&self) -> f64 {
        self.volume
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    pub fn executed_volume_f64(&self) -> f64 {
        self.executed_volume
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.state == "done"
    }
}

/// 새 입금이 감지되었을 때 모니터가 발행하는 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub amount: f64,
    pub fee: f64,
    pub net_amount: f64,
    pub network: String,
    pub txid: String,
    pub done_at: Option<DateTime<Utc>>,
}

impl From<&Deposit> for DepositEvent {
    fn from(d: &Deposit) -> Self {
        DepositEvent {
            amount: d.amount_f64(),
            fee: d.fee_f64(),
            net_amount: d.net_amount(),
            network: d.net_type.clone().unwrap_or_else(|| "Unknown".to_string()),
            txid: d.txid.clone().unwrap_or_else(|| "N/A".to_string()),
            done_at: d.done_at,
        }
    }
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("other error: {0}")]
    Other(String),
}
