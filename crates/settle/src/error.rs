use interface::ExchangeError;
use sheets::StoreError;
use thiserror::Error;

use crate::workflow::stage::Stage;

/// 봇 전역에서 쓰는 에러 타입.
///
/// 사용자에게 그대로 보여줄 수 있는 한국어 메시지를 Display 로 가진다.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("계좌코드를 찾을 수 없습니다")]
    AccountNotFound,

    #[error("해당 코드를 찾을 수 없습니다.")]
    RecordNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("알 수 없는 명령어입니다.")]
    UnknownCommand,

    #[error("'{from}' 상태에서는 '{command}' 명령을 처리할 수 없습니다.")]
    InvalidTransition { from: Stage, command: String },

    #[error("이미 실행 중입니다.")]
    AlreadyActive,

    #[error("실행 중이 아닙니다.")]
    NotActive,

    #[error("시트 오류: {0}")]
    Store(#[from] StoreError),

    #[error("거래소 오류: {0}")]
    Exchange(#[from] ExchangeError),
}
