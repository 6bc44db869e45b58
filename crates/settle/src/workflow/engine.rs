use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Local;
use rand::Rng;
use sheets::{cell_ref, RecordStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use super::row::{self, col, WorkRow};
use super::stage::{classify, Stage, TransitionCommand};
use crate::error::BotError;

pub const WORK_SHEET: &str = "당일작업";
pub const WORK_RANGE: &str = "당일작업!A:T";
const ACCOUNT_RANGE: &str = "당일작업!W:Z";
const RATE_RANGE: &str = "출금내역시트!A:P";

/// 발급코드 충돌 시 재생성 한도.
const CODE_RETRY_LIMIT: usize = 100;

/// 개인시트로 옮길 때의 열 순서 (당일작업 행 기준 인덱스).
const ARCHIVE_PROJECTION: [usize; 16] = [
    col::DEPOSIT_DATE,
    col::NAME,
    col::PLATFORM,
    col::BANK_INFO,
    col::DEPOSIT,
    col::WITHDRAWAL,
    col::PROFIT,
    col::SETTLEMENT,
    col::FINAL_AMOUNT,
    col::UNIT_PRICE,
    col::FOREIGN_DATE,
    col::FOREIGN_AMOUNT,
    col::FOREIGN_RECEIVED,
    col::CURRENCY,
    col::ACCOUNT_CODE,
    col::ISSUE_CODE,
];

/// 계좌 디렉터리(당일작업!W:Z)의 한 행.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub name: String,
    pub platform: String,
    pub bank_info: String,
}

/// 당일작업 시트를 다루는 연산 모음.
///
/// 모든 변경 연산은 발급코드 단위 잠금을 잡은 뒤 읽기-판정-쓰기를
/// 수행하므로 같은 레코드에 대한 동시 명령이 끼어들 수 없다.
pub struct WorkflowEngine {
    store: Arc<dyn RecordStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn record_lock(&self, issue_code: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(issue_code.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// 계좌코드로 디렉터리에서 이름/플랫폼/계좌정보를 찾는다.
    pub async fn account_info(&self, account_code: &str) -> Result<Option<AccountInfo>, BotError> {
        let rows = self.store.read_range(ACCOUNT_RANGE).await?;
        for r in &rows {
            if r.get(3).map(String::as_str) == Some(account_code) {
                return Ok(Some(AccountInfo {
                    name: r.first().cloned().unwrap_or_default(),
                    platform: r.get(1).cloned().unwrap_or_default(),
                    bank_info: r.get(2).cloned().unwrap_or_default(),
                }));
            }
        }
        Ok(None)
    }

    /// 미사용 4자리 발급코드를 뽑는다. [1000, 9999) 구간.
    async fn fresh_issue_code(&self) -> Result<String, BotError> {
        let rows = self.store.read_range(WORK_RANGE).await?;
        let existing: HashSet<String> = rows
            .iter()
            .skip(1)
            .filter_map(|r| r.get(col::ISSUE_CODE))
            .filter(|c| !c.is_empty())
            .cloned()
            .collect();

        for _ in 0..CODE_RETRY_LIMIT {
            let code = rand::thread_rng().gen_range(1000..9999).to_string();
            if !existing.contains(&code) {
                return Ok(code);
            }
        }
        Err(BotError::Validation(
            "발급코드를 생성하지 못했습니다. 잠시 후 다시 시도해주세요.".into(),
        ))
    }

    /// 대기 레코드 등록. `계좌코드 출금액 외화 종류` 명령의 본체.
    pub async fn create_record(
        &self,
        account_code: &str,
        withdrawal: &str,
        foreign_amount: &str,
        currency_label: &str,
    ) -> Result<String, BotError> {
        let withdrawal = row::parse_amount(withdrawal)
            .ok_or_else(|| BotError::Validation("등록을 실패하였습니다. (형식오류)".into()))?;
        let foreign_amount = row::parse_amount(foreign_amount)
            .ok_or_else(|| BotError::Validation("등록을 실패하였습니다. (형식오류)".into()))?;

        let account = self
            .account_info(account_code)
            .await?
            .ok_or(BotError::AccountNotFound)?;

        let currency = row::normalize_currency(currency_label);
        let issue_code = self.fresh_issue_code().await?;

        let mut cells = vec![String::new(); col::COUNT];
        cells[col::DEPOSIT_DATE] = row::today_string();
        cells[col::NAME] = account.name;
        cells[col::PLATFORM] = account.platform;
        cells[col::BANK_INFO] = account.bank_info;
        cells[col::WITHDRAWAL] = withdrawal.to_string();
        cells[col::FOREIGN_AMOUNT] = foreign_amount.to_string();
        cells[col::CURRENCY] = currency;
        cells[col::ISSUE_CODE] = issue_code.clone();
        cells[col::ACCOUNT_CODE] = account_code.to_string();

        self.store.append_row(WORK_RANGE, &cells).await?;
        info!(issue_code = %issue_code, account_code, "대기 레코드 등록");

        Ok(format!("정상등록 되었습니다.\n발급코드 : {}", issue_code))
    }

    /// 발급코드로 당일작업 행을 찾는다. (1-기반 시트 행, 파싱된 행)
    async fn find_row(&self, issue_code: &str) -> Result<(usize, WorkRow), BotError> {
        let rows = self.store.read_range(WORK_RANGE).await?;
        for (i, cells) in rows.iter().enumerate().skip(1) {
            if cells.get(col::ISSUE_CODE).map(String::as_str) == Some(issue_code) {
                return Ok((i + 1, WorkRow::from_cells(cells)));
            }
        }
        Err(BotError::RecordNotFound)
    }

    /// `<발급코드> <명령> [금액]` 형태의 상태 전이를 처리한다.
    ///
    /// 현재 단계가 명령의 허용 단계와 다르면 시트를 건드리지 않고
    /// `InvalidTransition` 으로 거부한다.
    pub async fn apply_transition(
        &self,
        issue_code: &str,
        word: &str,
        value: Option<&str>,
    ) -> Result<String, BotError> {
        let cmd = TransitionCommand::from_word(word).ok_or(BotError::UnknownCommand)?;

        let _guard = self.record_lock(issue_code).await;
        let (sheet_row, record) = self.find_row(issue_code).await?;

        let stage = classify(&record);
        if stage != cmd.allowed_from() {
            return Err(BotError::InvalidTransition {
                from: stage,
                command: cmd.word().to_string(),
            });
        }

        let result = match cmd {
            TransitionCommand::ForeignDeposit => {
                let amount = required_amount(cmd, value)?;
                self.do_foreign_deposit(issue_code, &record, sheet_row, amount)
                    .await
            }
            TransitionCommand::Progress => self.do_progress(issue_code, &record, sheet_row).await,
            TransitionCommand::ExchangeRemaining => {
                let amount = required_amount(cmd, value)?;
                self.do_exchange_remaining(issue_code, &record, sheet_row, amount)
                    .await
            }
            TransitionCommand::DomesticDeposit => {
                let amount = required_amount(cmd, value)?;
                self.do_domestic_deposit(issue_code, &record, sheet_row, amount)
                    .await
            }
            TransitionCommand::Settlement => {
                let amount = required_amount(cmd, value)?;
                self.do_settlement(issue_code, &record, sheet_row, amount)
                    .await
            }
            TransitionCommand::SettlementComplete => {
                self.do_settlement_complete(issue_code, &record, sheet_row)
                    .await
            }
        };

        if let Ok(msg) = &result {
            info!(issue_code, command = cmd.word(), from = %stage, reply = %msg, "상태 전이");
        }
        result
    }

    async fn do_foreign_deposit(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
        amount: i64,
    ) -> Result<String, BotError> {
        let net = amount - row::exchange_fee(&record.currency);

        self.update(col::FOREIGN_DATE, sheet_row, &row::today_string())
            .await?;
        self.update(col::FOREIGN_RECEIVED, sheet_row, &amount.to_string())
            .await?;
        self.update(col::FOREIGN_NET, sheet_row, &net.to_string())
            .await?;

        Ok(format!(
            "코드 : {} 금액 : {} 거래소입금요망!",
            issue_code, net
        ))
    }

    async fn do_progress(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
    ) -> Result<String, BotError> {
        self.update(col::PROGRESS, sheet_row, "진행").await?;

        let net = record
            .foreign_net
            .map(|v| v.to_string())
            .unwrap_or_default();
        Ok(format!("코드 : {} 금액 : {} 작업중!", issue_code, net))
    }

    async fn do_exchange_remaining(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
        amount: i64,
    ) -> Result<String, BotError> {
        let final_dollar = row::final_amount(amount);

        self.update(col::EXCHANGE_REMAINING, sheet_row, &amount.to_string())
            .await?;
        self.update(col::FINAL_AMOUNT, sheet_row, &final_dollar.to_string())
            .await?;

        // 당일 환율이 아직 없으면 달러가격 칸은 비워 둔다
        let price = match self.today_unit_price().await {
            Ok(p) => p,
            Err(e) => {
                warn!("당일 달러가격 조회 실패: {}", e);
                None
            }
        };
        if let Some(p) = price {
            self.update(col::UNIT_PRICE, sheet_row, &p.to_string())
                .await?;
        }

        Ok(format!(
            "코드 : {} , 달러 {} 가격 : {}\n{} {} {}원 입금요망",
            issue_code,
            final_dollar,
            price.map(|p| p.to_string()).unwrap_or_default(),
            record.bank_info,
            record.name,
            row::format_number(record.withdrawal.unwrap_or(0)),
        ))
    }

    async fn do_domestic_deposit(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
        amount: i64,
    ) -> Result<String, BotError> {
        let final_dollar = record.final_amount.ok_or_else(|| {
            BotError::Validation("최종달러가 없어 입금 처리를 할 수 없습니다.".into())
        })?;

        // 바낸달러 시점에 환율이 없었으면 지금 다시 찾아본다
        let unit_price = match record.unit_price {
            Some(p) => p,
            None => {
                let p = self.today_unit_price().await?.ok_or_else(|| {
                    BotError::Validation(
                        "달러가격이 등록되지 않아 입금 처리를 할 수 없습니다.".into(),
                    )
                })?;
                self.update(col::UNIT_PRICE, sheet_row, &p.to_string())
                    .await?;
                p
            }
        };

        let profit = row::profit(final_dollar, unit_price, record.withdrawal.unwrap_or(0));

        self.update(col::DEPOSIT, sheet_row, &amount.to_string())
            .await?;
        self.update(col::PROFIT, sheet_row, &profit.to_string())
            .await?;

        Ok(format!(
            "코드 : {} {} {}원 입금요망",
            issue_code,
            record.name,
            row::format_number(profit)
        ))
    }

    async fn do_settlement(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
        amount: i64,
    ) -> Result<String, BotError> {
        self.update(col::PROFIT_DEPOSIT, sheet_row, &amount.to_string())
            .await?;
        self.update(col::SETTLEMENT, sheet_row, "정산완료").await?;

        Ok(format!(
            "코드:{} {} {}원 정산완료",
            issue_code,
            record.name,
            row::format_number(amount)
        ))
    }

    async fn do_settlement_complete(
        &self,
        issue_code: &str,
        record: &WorkRow,
        sheet_row: usize,
    ) -> Result<String, BotError> {
        self.update(col::SETTLEMENT, sheet_row, "정산완료").await?;
        Ok(format!("코드:{} {} 정산완료", issue_code, record.name))
    }

    async fn update(&self, column: usize, sheet_row: usize, value: &str) -> Result<(), BotError> {
        self.store
            .update_cell(&cell_ref(WORK_SHEET, column, sheet_row), value)
            .await?;
        Ok(())
    }

    /// 단계별 목록을 사람이 읽을 한국어 텍스트로 만든다.
    pub async fn list(&self, stage: Stage) -> Result<String, BotError> {
        let rows = self.store.read_range(WORK_RANGE).await?;

        let mut lines = Vec::new();
        for cells in rows.iter().skip(1) {
            let record = WorkRow::from_cells(cells);
            // 발급코드 없는 행(빈 행, 디렉터리 행)은 레코드가 아니다
            if record.issue_code.is_empty() {
                continue;
            }
            if classify(&record) == stage {
                lines.push(list_line(stage, &record));
            }
        }

        if lines.is_empty() {
            return Ok(empty_message(stage).to_string());
        }
        Ok(format!("📋 {} 목록\n\n{}", list_header(stage), lines.join("\n")))
    }

    /// 정산완료 행을 개인시트로 옮기고 당일작업에서 지운다. (리빌드)
    ///
    /// 삭제는 아래쪽 행부터 해야 위쪽 행 번호가 밀리지 않는다.
    pub async fn archive(&self) -> Result<usize, BotError> {
        let rows = self.store.read_range(WORK_RANGE).await?;

        let mut processed: Vec<usize> = Vec::new();
        for (i, cells) in rows.iter().enumerate().skip(1) {
            let record = WorkRow::from_cells(cells);
            if record.issue_code.is_empty() || !record.is_settled() {
                continue;
            }
            if self.copy_to_personal_sheet(&record, cells).await {
                processed.push(i + 1);
            }
        }

        for sheet_row in processed.iter().rev() {
            self.store
                .delete_rows(WORK_SHEET, sheet_row - 1, *sheet_row)
                .await?;
        }

        info!(count = processed.len(), "리빌드 완료");
        Ok(processed.len())
    }

    /// 개인시트 복사. 이미 같은 발급코드가 있으면 건너뛴다.
    /// 복사에 성공한 행만 원본 삭제 대상이 된다.
    async fn copy_to_personal_sheet(&self, record: &WorkRow, cells: &[String]) -> bool {
        let code_range = format!("{}!P:P", record.name);

        // 개인시트가 아직 없으면 읽기가 실패할 수 있다. 비어 있는 것으로 본다
        let existing = match self.store.read_range(&code_range).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(name = %record.name, "개인시트 조회 실패(새 시트로 간주): {}", e);
                Vec::new()
            }
        };
        let duplicate = existing
            .iter()
            .skip(1)
            .any(|r| r.first().map(String::as_str) == Some(record.issue_code.as_str()));
        if duplicate {
            info!(issue_code = %record.issue_code, name = %record.name, "중복 발급코드, 복사 생략");
            return false;
        }

        let projected: Vec<String> = ARCHIVE_PROJECTION
            .iter()
            .map(|&i| cells.get(i).cloned().unwrap_or_default())
            .collect();

        match self
            .store
            .append_row(&format!("{}!A:P", record.name), &projected)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(name = %record.name, "개인시트 복사 실패: {}", e);
                false
            }
        }
    }

    /// 출금내역시트에서 오늘 날짜 행의 당일달러(P열)를 찾는다.
    pub async fn today_unit_price(&self) -> Result<Option<i64>, BotError> {
        let rows = self.store.read_range(RATE_RANGE).await?;
        let today = Local::now().date_naive();

        for cells in rows.iter().skip(1) {
            let Some(date) =
                row::parse_sheet_date(cells.first().map(String::as_str).unwrap_or(""))
            else {
                continue;
            };
            if date != today {
                continue;
            }

            let raw = cells
                .get(15)
                .map(|s| s.trim().replace(',', ""))
                .unwrap_or_default();
            if raw.is_empty() {
                return Ok(None);
            }
            if let Ok(v) = raw.parse::<i64>() {
                return Ok(Some(v));
            }
            return Ok(raw.parse::<f64>().ok().map(|f| f.round() as i64));
        }
        Ok(None)
    }
}

fn required_amount(cmd: TransitionCommand, value: Option<&str>) -> Result<i64, BotError> {
    row::parse_amount(value.unwrap_or("")).ok_or_else(|| {
        BotError::Validation(format!("'{}' 명령에는 숫자 금액이 필요합니다.", cmd.word()))
    })
}

fn list_header(stage: Stage) -> &'static str {
    match stage {
        Stage::Waiting => "대기",
        Stage::ForeignDepositPending => "진행대기",
        Stage::InProgress => "진행 중",
        Stage::SettlementPending => "정산대기",
        Stage::Settling => "정산 중",
        Stage::Settled => "정산완료",
    }
}

fn empty_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Waiting => "대기 중인 작업이 없습니다.",
        Stage::ForeignDepositPending => "진행대기 중인 작업이 없습니다.",
        Stage::InProgress => "진행 중인 작업이 없습니다.",
        Stage::SettlementPending => "정산대기 중인 작업이 없습니다.",
        Stage::Settling => "정산 중인 작업이 없습니다.",
        Stage::Settled => "정산완료된 작업이 없습니다.",
    }
}

fn list_line(stage: Stage, r: &WorkRow) -> String {
    match stage {
        Stage::Waiting | Stage::ForeignDepositPending | Stage::InProgress => {
            let status = match stage {
                Stage::Waiting => "해외계좌입금전",
                Stage::ForeignDepositPending => "거래소입금전",
                _ => "작업중",
            };
            format!(
                "{}, 코드:{}, {}원, {}{}, {}",
                r.deposit_date,
                r.issue_code,
                row::format_number(r.withdrawal.unwrap_or(0)),
                r.foreign_amount.unwrap_or(0),
                r.currency,
                status
            )
        }
        Stage::SettlementPending => format!(
            "{}, 코드:{}, {}원, 최종달러:{}, 달러가격:{}",
            r.deposit_date,
            r.issue_code,
            row::format_number(r.withdrawal.unwrap_or(0)),
            r.final_amount.unwrap_or(0),
            r.unit_price.unwrap_or(0)
        ),
        Stage::Settling | Stage::Settled => format!(
            "{}, 코드:{}, {}원, 수익:{}원",
            r.deposit_date,
            r.issue_code,
            row::format_number(r.deposit.unwrap_or(0)),
            row::format_number(r.profit.unwrap_or(0))
        ),
    }
}
