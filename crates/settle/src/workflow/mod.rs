//! 당일작업 시트의 레코드 생애주기.
//!
//! `row` 는 20칸짜리 행과 금액 계산 규칙, `stage` 는 단계 분류와
//! 전이 규칙, `engine` 은 시트를 건드리는 실제 연산을 담당한다.

pub mod engine;
pub mod row;
pub mod stage;

pub use engine::WorkflowEngine;
pub use row::WorkRow;
pub use stage::Stage;
