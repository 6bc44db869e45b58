pub mod cellref;
pub mod client;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use cellref::{cell_ref, column_letter, parse_cell_ref};
pub use client::SheetsClient;
pub use memory::MemoryStore;

/// 행 단위 원격 저장소 공통 인터페이스.
/// 실제 구현은 구글 시트이고, 테스트에서는 인메모리 구현으로 대체한다.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 범위 읽기 (예: "당일작업!A:T"). 빈 시트는 빈 벡터.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// 범위 끝에 행 추가
    async fn append_row(&self, range: &str, row: &[String]) -> Result<(), StoreError>;

    /// 단일 셀 갱신 (예: "당일작업!L5")
    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), StoreError>;

    /// 행 삭제. [start, end)는 시트 행 공간에서 0-기반 반개구간.
    async fn delete_rows(&self, sheet: &str, start: usize, end: usize) -> Result<(), StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("other error: {0}")]
    Other(String),
}
