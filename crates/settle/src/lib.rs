//! 송금 정산 봇의 코어 크레이트.
//!
//! 작업 기록의 생애주기(`workflow`), 업비트 입금 감시(`monitor`),
//! 자동 매도(`autotrade`), 텔레그램 명령 처리(`command`/`server`)를 담는다.

pub mod autotrade;
pub mod command;
pub mod context;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

// 바이너리든 테스트든 환경변수를 읽기 전에 .env 를 로드한다.
#[ctor::ctor]
fn load_dotenv() {
    let _ = dotenv::dotenv();
}
