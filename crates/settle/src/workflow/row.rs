use chrono::{Datelike, Local, NaiveDate};

/// 당일작업 시트의 열 인덱스 (0-base, A:T).
pub mod col {
    pub const DEPOSIT_DATE: usize = 0; // A 입금날짜
    pub const NAME: usize = 1; // B 이름
    pub const PLATFORM: usize = 2; // C 플랫폼
    pub const BANK_INFO: usize = 3; // D 계좌정보
    pub const DEPOSIT: usize = 4; // E 입금
    pub const WITHDRAWAL: usize = 5; // F 출금
    pub const PROFIT: usize = 6; // G 수익
    pub const PROFIT_DEPOSIT: usize = 7; // H 수익입금
    pub const SETTLEMENT: usize = 8; // I 정산
    pub const FOREIGN_DATE: usize = 9; // J 외화입금날짜
    pub const FOREIGN_AMOUNT: usize = 10; // K 외화
    pub const FOREIGN_RECEIVED: usize = 11; // L 외화입금
    pub const FOREIGN_NET: usize = 12; // M 외화출금
    pub const CURRENCY: usize = 13; // N 종류
    pub const PROGRESS: usize = 14; // O 진행여부
    pub const EXCHANGE_REMAINING: usize = 15; // P 바낸달러
    pub const FINAL_AMOUNT: usize = 16; // Q 최종달러
    pub const ISSUE_CODE: usize = 17; // R 발급코드
    pub const UNIT_PRICE: usize = 18; // S 달러가격
    pub const ACCOUNT_CODE: usize = 19; // T 계좌코드
    pub const COUNT: usize = 20;
}

/// 당일작업 시트의 한 행을 타입 있는 필드로 푼 것.
///
/// 숫자 칸은 비어 있거나 숫자가 아니면 None 으로 읽는다. 시트에는
/// 문자열로만 저장되므로 쓰기는 전부 셀 단위 문자열로 한다.
#[derive(Debug, Clone, Default)]
pub struct WorkRow {
    pub deposit_date: String,
    pub name: String,
    pub platform: String,
    pub bank_info: String,
    pub deposit: Option<i64>,
    pub withdrawal: Option<i64>,
    pub profit: Option<i64>,
    pub profit_deposit: Option<i64>,
    pub settlement: String,
    pub foreign_date: String,
    pub foreign_amount: Option<i64>,
    pub foreign_received: Option<i64>,
    pub foreign_net: Option<i64>,
    pub currency: String,
    pub progress: String,
    pub exchange_remaining: Option<i64>,
    pub final_amount: Option<i64>,
    pub issue_code: String,
    pub unit_price: Option<i64>,
    pub account_code: String,
}

impl WorkRow {
    /// 시트에서 읽은 행(길이 20 미만일 수 있음)을 파싱한다.
    pub fn from_cells(cells: &[String]) -> Self {
        let get = |i: usize| cells.get(i).cloned().unwrap_or_default();
        let num = |i: usize| parse_amount(&get(i));

        WorkRow {
            deposit_date: get(col::DEPOSIT_DATE),
            name: get(col::NAME),
            platform: get(col::PLATFORM),
            bank_info: get(col::BANK_INFO),
            deposit: num(col::DEPOSIT),
            withdrawal: num(col::WITHDRAWAL),
            profit: num(col::PROFIT),
            profit_deposit: num(col::PROFIT_DEPOSIT),
            settlement: get(col::SETTLEMENT),
            foreign_date: get(col::FOREIGN_DATE),
            foreign_amount: num(col::FOREIGN_AMOUNT),
            foreign_received: num(col::FOREIGN_RECEIVED),
            foreign_net: num(col::FOREIGN_NET),
            currency: get(col::CURRENCY),
            progress: get(col::PROGRESS),
            exchange_remaining: num(col::EXCHANGE_REMAINING),
            final_amount: num(col::FINAL_AMOUNT),
            issue_code: get(col::ISSUE_CODE),
            unit_price: num(col::UNIT_PRICE),
            account_code: get(col::ACCOUNT_CODE),
        }
    }

    /// 정산 칸이 완료 마커인지.
    pub fn is_settled(&self) -> bool {
        matches!(self.settlement.trim(), "정산완료" | "완료")
    }
}

/// 시트 셀의 금액 파싱. 빈 칸/비숫자는 None, 천단위 콤마는 허용.
pub fn parse_amount(cell: &str) -> Option<i64> {
    let cleaned: String = cell.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

/// 통화 표기를 정규화한다. 한국어 약칭은 코드로, 나머지는 대문자 그대로.
pub fn normalize_currency(label: &str) -> String {
    match label.trim() {
        "홍달" | "홍콩달러" => "HKD".to_string(),
        "미달" | "미국달러" => "USD".to_string(),
        other => other.to_uppercase(),
    }
}

/// 통화별 거래소 입금 수수료. 미등록 통화는 2.
pub fn exchange_fee(currency: &str) -> i64 {
    match currency {
        "HKD" => 15,
        "USD" => 2,
        _ => 2,
    }
}

/// 바낸달러 잔액에서 전송 비용 1달러를 뺀 최종달러.
pub fn final_amount(remaining: i64) -> i64 {
    remaining - 1
}

/// 수익 = floor((최종달러 × 달러가격 − 출금액) / 2). 음수도 내림.
pub fn profit(final_dollar: i64, unit_price: i64, withdrawal: i64) -> i64 {
    (final_dollar * unit_price - withdrawal).div_euclid(2)
}

/// 1234567 -> "1,234,567". 원화 금액 표시에 쓴다.
pub fn format_number(n: i64) -> String {
    let negative = n < 0;
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

/// 오늘 날짜를 시트의 ko-KR 표기("2025. 1. 3.")로.
pub fn today_string() -> String {
    let today = Local::now().date_naive();
    format!("{}. {}. {}.", today.year(), today.month(), today.day())
}

/// 시트에 섞여 있는 날짜 표기들을 관용적으로 파싱한다.
pub fn parse_sheet_date(cell: &str) -> Option<NaiveDate> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in ["%Y. %m. %d.", "%Y.%m.%d.", "%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    None
}
