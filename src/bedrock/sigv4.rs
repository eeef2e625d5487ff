//! AWS Signature Version 4 request signing.
//!
//! Only what Bedrock runtime calls need: a single POST with an empty query
//! string, signed headers supplied by the caller.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::BedrockError;
use crate::config::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Percent-encode per RFC 3986, leaving unreserved characters intact.
/// `/` is kept when `keep_slash` is set.
pub fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, BedrockError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| BedrockError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, BedrockError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date)?;
    let k_region = hmac(&k_date, region)?;
    let k_service = hmac(&k_region, service)?;
    hmac(&k_service, "aws4_request")
}

/// Sign a request and return the headers to attach to it: `x-amz-date`,
/// `x-amz-security-token` when a session token is set, and `authorization`.
///
/// `path` is the request path exactly as it goes on the wire. `headers` are
/// extra headers to include in the signature; `host` is always signed.
pub fn sign(
    params: &SigningParams<'_>,
    method: &str,
    host: &str,
    path: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> Result<Vec<(String, String)>, BedrockError> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut signed: Vec<(String, String)> = vec![
        ("host".into(), host.trim().to_string()),
        ("x-amz-date".into(), amz_date.clone()),
    ];
    if let Some(token) = &params.credentials.session_token {
        signed.push(("x-amz-security-token".into(), token.clone()));
    }
    for (name, value) in headers {
        signed.push((name.to_lowercase(), value.trim().to_string()));
    }
    signed.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = signed
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    let signed_headers = signed
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    // Non-S3 services encode the already-encoded path a second time.
    let canonical_uri = if path.is_empty() {
        "/".to_string()
    } else {
        uri_encode(path, true)
    };

    let canonical_request = format!(
        "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(payload)
    );

    let scope = format!(
        "{date}/{}/{}/aws4_request",
        params.region, params.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &params.credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac(&key, &string_to_sign)?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id
    );

    let mut out = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token".into(), token.clone()));
    }
    out.push(("authorization".into(), authorization));
    Ok(out)
}
