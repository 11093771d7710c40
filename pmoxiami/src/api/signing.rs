//! MD5 request signing for the Xiami h5 API
//!
//! Every call carries four query parameters: `t`, `appKey`, `sign` and `data`.
//! `data` is the request envelope `{"header": .., "model": ..}` serialized to
//! JSON and wrapped again as the string field `requestStr`. The signature is
//! computed over that encoded string, never over the raw structure.

use crate::error::Result;
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{Value, json};

/// Text signed in place of a session token that has not been acquired yet
pub const NO_TOKEN: &str = "null";

/// Header sent inside every request envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    /// Application id, paired with the app key
    pub app_id: u32,
    /// Platform label (`h5`)
    pub platform_id: String,
    /// User access token, once logged in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl RequestHeader {
    pub fn new(app_id: u32, platform_id: impl Into<String>) -> Self {
        Self {
            app_id,
            platform_id: platform_id.into(),
            access_token: None,
        }
    }
}

/// Query parameters of one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    /// Timestamp in milliseconds since the Unix epoch
    pub t: i64,
    pub app_key: String,
    /// Hex MD5 signature
    pub sign: String,
    /// Double-encoded request envelope
    pub data: String,
}

impl SignedParams {
    /// Returns the parameters in the order the API expects them
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("t", self.t.to_string()),
            ("appKey", self.app_key.clone()),
            ("sign", self.sign.clone()),
            ("data", self.data.clone()),
        ]
    }
}

/// Current Unix timestamp in milliseconds
pub fn get_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Encodes the request envelope as the `data` parameter
///
/// ```
/// use pmoxiami::api::signing::{encode_data, RequestHeader};
/// let header = RequestHeader::new(200, "h5");
/// let data = encode_data(&header, &serde_json::json!({"songId": "1"})).unwrap();
/// assert!(data.starts_with("{\"requestStr\":"));
/// ```
pub fn encode_data(header: &RequestHeader, payload: &Value) -> Result<String> {
    let request_str = serde_json::to_string(&json!({
        "header": header,
        "model": payload,
    }))?;
    Ok(serde_json::to_string(&json!({ "requestStr": request_str }))?)
}

/// Computes `md5(token&t&appKey&data)` as lowercase hex
pub fn compute_signature(
    session_token: Option<&str>,
    timestamp_ms: i64,
    app_key: &str,
    data: &str,
) -> String {
    let mut hasher = Md5::new();

    hasher.update(session_token.unwrap_or(NO_TOKEN).as_bytes());
    hasher.update(b"&");
    hasher.update(timestamp_ms.to_string().as_bytes());
    hasher.update(b"&");
    hasher.update(app_key.as_bytes());
    hasher.update(b"&");
    hasher.update(data.as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Signs a payload
///
/// Pure: the same inputs always produce the same parameters.
///
/// # Arguments
///
/// * `session_token` - Cached session token, `None` before the bootstrap call
/// * `header` - Request header (app id, platform, access token)
/// * `payload` - Action-specific model
/// * `timestamp_ms` - Request time, see [`get_timestamp_ms`]
/// * `app_key` - App key paired with the header's app id
pub fn sign_payload(
    session_token: Option<&str>,
    header: &RequestHeader,
    payload: &Value,
    timestamp_ms: i64,
    app_key: &str,
) -> Result<SignedParams> {
    let data = encode_data(header, payload)?;
    let sign = compute_signature(session_token, timestamp_ms, app_key, &data);

    Ok(SignedParams {
        t: timestamp_ms,
        app_key: app_key.to_string(),
        sign,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_KEY: &str = "23649156";

    fn header() -> RequestHeader {
        RequestHeader::new(200, "h5")
    }

    #[test]
    fn test_get_timestamp_ms() {
        // 1er janvier 2024, en millisecondes
        assert!(get_timestamp_ms() > 1_704_067_200_000);
    }

    #[test]
    fn test_data_is_double_encoded() {
        let data = encode_data(&header(), &json!({"songId": "1"})).unwrap();

        let outer: Value = serde_json::from_str(&data).unwrap();
        let inner_str = outer["requestStr"].as_str().expect("requestStr is a string");
        let inner: Value = serde_json::from_str(inner_str).unwrap();

        assert_eq!(inner["header"]["appId"], 200);
        assert_eq!(inner["header"]["platformId"], "h5");
        assert!(inner["header"].get("accessToken").is_none());
        assert_eq!(inner["model"]["songId"], "1");
    }

    #[test]
    fn test_access_token_in_header() {
        let mut header = header();
        header.access_token = Some("acc".to_string());
        let data = encode_data(&header, &json!({})).unwrap();
        let outer: Value = serde_json::from_str(&data).unwrap();
        let inner: Value = serde_json::from_str(outer["requestStr"].as_str().unwrap()).unwrap();
        assert_eq!(inner["header"]["accessToken"], "acc");
    }

    #[test]
    fn test_signature_matches_reference_string() {
        let params = sign_payload(Some("tok"), &header(), &json!({"songId": "1"}), 1000, APP_KEY)
            .unwrap();

        let mut hasher = Md5::new();
        hasher.update(format!("tok&1000&{}&{}", APP_KEY, params.data).as_bytes());
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(params.sign, expected);
        assert_eq!(params.sign.len(), 32);
        assert_eq!(params.t, 1000);
        assert_eq!(params.app_key, APP_KEY);
    }

    #[test]
    fn test_missing_token_signs_literal_null() {
        let data = "{}";
        assert_eq!(
            compute_signature(None, 42, APP_KEY, data),
            compute_signature(Some("null"), 42, APP_KEY, data)
        );
        assert_ne!(
            compute_signature(None, 42, APP_KEY, data),
            compute_signature(Some(""), 42, APP_KEY, data)
        );
    }

    #[test]
    fn test_signature_consistency() {
        let payload = json!({"songId": "1"});
        let sig1 = sign_payload(Some("abc"), &header(), &payload, 100, APP_KEY).unwrap();
        let sig2 = sign_payload(Some("abc"), &header(), &payload, 100, APP_KEY).unwrap();
        assert_eq!(sig1, sig2);

        // Chaque entrée modifiée change la signature
        let other_token = sign_payload(Some("abd"), &header(), &payload, 100, APP_KEY).unwrap();
        let next_ms = sign_payload(Some("abc"), &header(), &payload, 101, APP_KEY).unwrap();
        let other_payload =
            sign_payload(Some("abc"), &header(), &json!({"songId": "2"}), 100, APP_KEY).unwrap();
        let mut logged_in = header();
        logged_in.access_token = Some("x".to_string());
        let other_header = sign_payload(Some("abc"), &logged_in, &payload, 100, APP_KEY).unwrap();

        for other in [&other_token, &next_ms, &other_payload, &other_header] {
            assert_ne!(sig1.sign, other.sign);
        }
    }

    #[test]
    fn test_to_query_order() {
        let params = sign_payload(None, &header(), &json!({}), 7, APP_KEY).unwrap();
        let keys: Vec<_> = params.to_query().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["t", "appKey", "sign", "data"]);
    }
}
