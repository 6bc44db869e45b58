//! 텔레그램 명령 파서와 디스패처.
//!
//! 문법:
//!   `<계좌코드> <출금액> <외화> <종류>`  → 대기 레코드 등록 (4토큰, 2·3번째가 숫자)
//!   `<발급코드> <전이명령> [금액]`        → 상태 전이
//!   그 외 첫 토큰이 키워드면 목록/리빌드/모니터링/자동거래 명령.

use tracing::warn;

use crate::context::AppContext;
use crate::error::BotError;
use crate::workflow::row::parse_amount;
use crate::workflow::Stage;

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Create {
        account_code: &'a str,
        withdrawal: &'a str,
        foreign_amount: &'a str,
        currency: &'a str,
    },
    List(Stage),
    Rebuild,
    MonitorStart,
    MonitorStop,
    TradeEnable,
    TradeDisable,
    Balance,
    Transition {
        issue_code: &'a str,
        word: &'a str,
        value: Option<&'a str>,
    },
    Unknown,
}

pub fn parse(text: &str) -> Command<'_> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    // 등록: 4토큰이고 가운데 둘이 숫자
    if tokens.len() == 4 && parse_amount(tokens[1]).is_some() && parse_amount(tokens[2]).is_some() {
        return Command::Create {
            account_code: tokens[0],
            withdrawal: tokens[1],
            foreign_amount: tokens[2],
            currency: tokens[3],
        };
    }

    match tokens.first().copied() {
        Some("대기목록") => return Command::List(Stage::Waiting),
        Some("진행대기목록") => return Command::List(Stage::ForeignDepositPending),
        Some("진행중") => return Command::List(Stage::InProgress),
        Some("정산대기") => return Command::List(Stage::SettlementPending),
        Some("정산중") => return Command::List(Stage::Settling),
        Some("정산완료목록") => return Command::List(Stage::Settled),
        Some("정산완료") if tokens.len() == 1 => return Command::List(Stage::Settled),
        Some("리빌드") => return Command::Rebuild,
        Some("입금체크") | Some("입금모니터링") | Some("모니터링시작") => {
            return Command::MonitorStart
        }
        Some("모니터링중지") | Some("입금체크중지") => return Command::MonitorStop,
        Some("자동거래시작") | Some("자동판매시작") | Some("오토트레이딩") => {
            return Command::TradeEnable
        }
        Some("자동거래중지") | Some("자동판매중지") | Some("오토트레이딩중지") => {
            return Command::TradeDisable
        }
        Some("잔고") => return Command::Balance,
        _ => {}
    }

    if tokens.len() >= 2 {
        return Command::Transition {
            issue_code: tokens[0],
            word: tokens[1],
            value: tokens.get(2).copied(),
        };
    }

    Command::Unknown
}

/// 명령 한 건 처리. 항상 사용자에게 보낼 한국어 문자열을 돌려준다.
pub async fn handle(ctx: &AppContext, chat_id: i64, text: &str) -> String {
    match parse(text) {
        Command::Create {
            account_code,
            withdrawal,
            foreign_amount,
            currency,
        } => match ctx
            .engine
            .create_record(account_code, withdrawal, foreign_amount, currency)
            .await
        {
            Ok(msg) => msg,
            Err(BotError::AccountNotFound) => "등록을 실패하였습니다. (계좌코드 오류)".to_string(),
            Err(BotError::Validation(msg)) => msg,
            Err(e) => upstream_failure("등록", e),
        },

        Command::List(stage) => match ctx.engine.list(stage).await {
            Ok(msg) => msg,
            Err(e) => upstream_failure("목록 조회", e),
        },

        Command::Rebuild => match ctx.engine.archive().await {
            Ok(count) => format!("리빌드 완료!\n처리된 항목: {}개", count),
            Err(e) => upstream_failure("리빌드", e),
        },

        Command::MonitorStart => match ctx.monitor.start(chat_id).await {
            Ok(msg) => msg,
            Err(BotError::AlreadyActive) => "이미 입금 모니터링이 실행 중입니다.".to_string(),
            Err(e) => upstream_failure("모니터링 시작", e),
        },

        Command::MonitorStop => match ctx.monitor.stop().await {
            Ok(msg) => msg,
            Err(BotError::NotActive) => "현재 실행 중인 모니터링이 없습니다.".to_string(),
            Err(e) => upstream_failure("모니터링 중지", e),
        },

        Command::TradeEnable => ctx.trader.enable().await,
        Command::TradeDisable => ctx.trader.disable().await,

        Command::Balance => match ctx.exchange.balance("USDT").await {
            Ok(balance) => format!("💰 업비트 USDT 잔고: {:.2} USDT", balance),
            Err(e) => upstream_failure("잔고 조회", e.into()),
        },

        Command::Transition {
            issue_code,
            word,
            value,
        } => match ctx.engine.apply_transition(issue_code, word, value).await {
            Ok(msg) => msg,
            Err(
                e @ (BotError::RecordNotFound
                | BotError::UnknownCommand
                | BotError::InvalidTransition { .. }
                | BotError::Validation(_)),
            ) => e.to_string(),
            Err(e) => upstream_failure("상태 변경", e),
        },

        Command::Unknown => "알 수 없는 명령어입니다.".to_string(),
    }
}

fn upstream_failure(what: &str, e: BotError) -> String {
    warn!("{} 처리 오류: {}", what, e);
    "명령어 처리 중 오류가 발생했습니다.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_numeric_tokens_are_a_creation() {
        assert_eq!(
            parse("7001 700000 498 미달"),
            Command::Create {
                account_code: "7001",
                withdrawal: "700000",
                foreign_amount: "498",
                currency: "미달",
            }
        );
        // 숫자가 아니면 등록이 아니라 전이로 본다
        assert_eq!(
            parse("7001 입금 498 미달"),
            Command::Transition {
                issue_code: "7001",
                word: "입금",
                value: Some("498"),
            }
        );
    }

    #[test]
    fn list_keywords() {
        assert_eq!(parse("대기목록"), Command::List(Stage::Waiting));
        assert_eq!(parse("진행대기목록"), Command::List(Stage::ForeignDepositPending));
        assert_eq!(parse("진행중"), Command::List(Stage::InProgress));
        assert_eq!(parse("정산대기"), Command::List(Stage::SettlementPending));
        assert_eq!(parse("정산중"), Command::List(Stage::Settling));
        assert_eq!(parse("정산완료"), Command::List(Stage::Settled));
        assert_eq!(parse("정산완료목록"), Command::List(Stage::Settled));
    }

    #[test]
    fn settlement_complete_with_code_is_a_transition() {
        assert_eq!(
            parse("4821 정산완료"),
            Command::Transition {
                issue_code: "4821",
                word: "정산완료",
                value: None,
            }
        );
    }

    #[test]
    fn monitoring_and_trading_aliases() {
        assert_eq!(parse("입금체크"), Command::MonitorStart);
        assert_eq!(parse("모니터링시작"), Command::MonitorStart);
        assert_eq!(parse("입금체크중지"), Command::MonitorStop);
        assert_eq!(parse("오토트레이딩"), Command::TradeEnable);
        assert_eq!(parse("자동판매중지"), Command::TradeDisable);
        assert_eq!(parse("리빌드"), Command::Rebuild);
        assert_eq!(parse("잔고"), Command::Balance);
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(parse("안녕"), Command::Unknown);
        assert_eq!(parse(""), Command::Unknown);
    }
}
