use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use sha2::{Digest, Sha512};
use uuid::Uuid;

use interface::ExchangeError;

/// 업비트 요청 서명용 JWT 페이로드.
/// 쿼리 파라미터가 있으면 SHA512 해시를 함께 서명한다.
#[derive(Debug, Serialize)]
struct UpbitClaims<'a> {
    access_key: &'a str,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// 요청별 JWT 토큰 생성. `query`는 실제 전송되는 쿼리 스트링과
/// 바이트 단위로 동일해야 한다.
pub fn sign_request(
    access_key: &str,
    secret_key: &str,
    query: Option<&str>,
) -> Result<String, ExchangeError> {
    let (query_hash, query_hash_alg) = match query {
        Some(q) => {
            let mut hasher = Sha512::new();
            hasher.update(q.as_bytes());
            (Some(hex::encode(hasher.finalize())), Some("SHA512"))
        }
        None => (None, None),
    };

    let claims = UpbitClaims {
        access_key,
        nonce: Uuid::new_v4().to_string(),
        query_hash,
        query_hash_alg,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
    .map_err(|e| ExchangeError::Auth(format!("JWT 서명 실패: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_without_query_produces_token() {
        let token = sign_request("access", "secret", None).unwrap();
        // header.payload.signature
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn sign_with_query_is_distinct_per_call() {
        // nonce가 매번 달라지므로 같은 쿼리라도 토큰이 달라야 한다
        let a = sign_request("access", "secret", Some("currency=USDT")).unwrap();
        let b = sign_request("access", "secret", Some("currency=USDT")).unwrap();
        assert_ne!(a, b);
    }
}
