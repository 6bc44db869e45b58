//! 구글 시트 REST v4 클라이언트.
//! 서비스 계정 JWT(RS256)를 액세스 토큰으로 교환해 인증한다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::{RecordStore, StoreError};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// GOOGLE_CREDENTIALS 환경변수로 전달되는 서비스 계정 키 JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'static str,
    aud: &'static str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    key: ServiceAccountKey,
    token: Mutex<Option<CachedToken>>,
    /// 시트 제목 -> 숫자 sheetId 캐시 (deleteDimension에 필요)
    sheet_ids: Mutex<HashMap<String, i64>>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, key: ServiceAccountKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.into(),
            key,
            token: Mutex::new(None),
            sheet_ids: Mutex::new(HashMap::new()),
        }
    }

    /// 환경변수 GOOGLE_SHEET_ID / GOOGLE_CREDENTIALS에서 생성
    pub fn from_env() -> Result<Self, StoreError> {
        let spreadsheet_id = std::env::var("GOOGLE_SHEET_ID")
            .map_err(|_| StoreError::Auth("GOOGLE_SHEET_ID not set".to_string()))?;
        let raw = std::env::var("GOOGLE_CREDENTIALS")
            .map_err(|_| StoreError::Auth("GOOGLE_CREDENTIALS not set".to_string()))?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Auth(format!("GOOGLE_CREDENTIALS 파싱 실패: {}", e)))?;
        Ok(Self::new(spreadsheet_id, key))
    }

    /// 유효한 액세스 토큰 반환. 만료 전이면 캐시 재사용.
    async fn access_token(&self) -> Result<String, StoreError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(cached.token.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: TOKEN_URL,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("서비스 계정 키 로드 실패: {}", e)))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| StoreError::Auth(format!("서비스 계정 JWT 서명 실패: {}", e)))?;

        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| StoreError::Auth(format!("토큰 발급 실패: {}", e)))?
            .json()
            .await?;

        let token = response.access_token.clone();
        *guard = Some(CachedToken {
            token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        });
        info!("구글 시트 액세스 토큰 갱신 완료");
        Ok(token)
    }

    /// 시트 제목을 숫자 sheetId로 해석 (스프레드시트 메타데이터 조회, 캐시)
    async fn resolve_sheet_id(&self, title: &str) -> Result<i64, StoreError> {
        {
            let cache = self.sheet_ids.lock().await;
            if let Some(id) = cache.get(title) {
                return Ok(*id);
            }
        }

        #[derive(Debug, Deserialize)]
        struct Metadata {
            sheets: Vec<SheetEntry>,
        }
        #[derive(Debug, Deserialize)]
        struct SheetEntry {
            properties: SheetProperties,
        }
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SheetProperties {
            sheet_id: i64,
            title: String,
        }

        let token = self.access_token().await?;
        let url = format!(
            "{}/{}?fields=sheets.properties",
            SHEETS_BASE_URL, self.spreadsheet_id
        );
        let metadata: Metadata = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut cache = self.sheet_ids.lock().await;
        for entry in metadata.sheets {
            cache.insert(entry.properties.title.clone(), entry.properties.sheet_id);
        }
        cache
            .get(title)
            .copied()
            .ok_or_else(|| StoreError::Other(format!("시트를 찾을 수 없습니다: {}", title)))
    }
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[async_trait]
impl RecordStore for SheetsClient {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let token = self.access_token().await?;
        let url = format!("{}/{}/values/{}", SHEETS_BASE_URL, self.spreadsheet_id, range);
        let response: ValuesResponse = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.values)
    }

    async fn append_row(&self, range: &str, row: &[String]) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            SHEETS_BASE_URL, self.spreadsheet_id, range
        );
        self.http
            .post(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values/{}?valueInputOption=RAW",
            SHEETS_BASE_URL, self.spreadsheet_id, cell
        );
        self.http
            .put(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_rows(&self, sheet: &str, start: usize, end: usize) -> Result<(), StoreError> {
        let sheet_id = self.resolve_sheet_id(sheet).await?;
        let token = self.access_token().await?;
        let url = format!("{}/{}:batchUpdate", SHEETS_BASE_URL, self.spreadsheet_id);
        self.http
            .post(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "requests": [{
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": start,
                            "endIndex": end,
                        }
                    }
                }]
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
