//! 인메모리 저장소 구현. 테스트와 드라이런에서 실제 시트 대신 사용한다.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{parse_cell_ref, RecordStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시트 전체를 한 번에 채운다 (테스트 픽스처용)
    pub async fn seed(&self, sheet: &str, rows: Vec<Vec<String>>) {
        self.sheets.lock().await.insert(sheet.to_string(), rows);
    }

    /// 시트 전체 스냅샷 (검증용)
    pub async fn snapshot(&self, sheet: &str) -> Vec<Vec<String>> {
        self.sheets
            .lock()
            .await
            .get(sheet)
            .cloned()
            .unwrap_or_default()
    }

    fn sheet_name(range: &str) -> &str {
        range.split_once('!').map(|(s, _)| s).unwrap_or(range)
    }

    /// "W:Z" 같은 열 전용 범위를 (시작, 끝) 0-기반 열 인덱스로 해석
    fn col_bounds(range: &str) -> Option<(usize, usize)> {
        let (_, bounds) = range.split_once('!')?;
        let (a, b) = bounds.split_once(':')?;
        let col = |s: &str| -> Option<usize> {
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            let mut n = 0usize;
            for c in s.chars() {
                n = n * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
            }
            Some(n - 1)
        };
        Some((col(a)?, col(b)?))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let sheets = self.sheets.lock().await;
        let rows = sheets
            .get(Self::sheet_name(range))
            .cloned()
            .unwrap_or_default();

        // 실제 API처럼 열 범위("W:Z")를 잘라서 돌려준다
        Ok(match Self::col_bounds(range) {
            Some((start, end)) => rows
                .into_iter()
                .map(|r| {
                    r.into_iter()
                        .skip(start)
                        .take(end - start + 1)
                        .collect::<Vec<_>>()
                })
                .collect(),
            None => rows,
        })
    }

    async fn append_row(&self, range: &str, row: &[String]) -> Result<(), StoreError> {
        let mut sheets = self.sheets.lock().await;
        sheets
            .entry(Self::sheet_name(range).to_string())
            .or_default()
            .push(row.to_vec());
        Ok(())
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), StoreError> {
        let (sheet, col, row) = parse_cell_ref(cell)
            .ok_or_else(|| StoreError::Other(format!("잘못된 셀 주소: {}", cell)))?;

        let mut sheets = self.sheets.lock().await;
        let rows = sheets.entry(sheet.to_string()).or_default();
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }
        let target = &mut rows[row - 1];
        if target.len() <= col {
            target.resize(col + 1, String::new());
        }
        target[col] = value.to_string();
        Ok(())
    }

    async fn delete_rows(&self, sheet: &str, start: usize, end: usize) -> Result<(), StoreError> {
        let mut sheets = self.sheets.lock().await;
        let rows = sheets.entry(sheet.to_string()).or_default();
        if start >= rows.len() || start >= end {
            return Err(StoreError::Other(format!(
                "삭제 범위가 잘못되었습니다: {}..{} (행 수: {})",
                start,
                end,
                rows.len()
            )));
        }
        rows.drain(start..end.min(rows.len()));
        Ok(())
    }
}
