//! AWS Signature Version 4 signing for KVS requests.
//!
//! The canonical request is derived from exactly the fields of a
//! [`RequestSpec`]: method, host, path (with query), headers, body and service.

use std::collections::BTreeMap;
use std::time::SystemTime;

use aws_credential_types::Credentials as AwsCredentials;
use aws_sigv4::http_request::{
    sign as sigv4_sign, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

use crate::errors::{KvsError, Result};

/// The request as seen by the signer. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub host: String,
    /// Path including the serialized query string.
    pub path: String,
    /// Header names keep the casing they were given with.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub service: String,
}

impl RequestSpec {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Insert a header, replacing any existing entry regardless of case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }
}

/// Key material and scope used to sign.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Sign `spec` with the current time.
pub fn sign(spec: &mut RequestSpec, credentials: &Credentials) -> Result<()> {
    sign_at(spec, credentials, Utc::now())
}

/// Sign `spec` as of `now`, adding `Host`, `X-Amz-Date` and `Authorization`.
///
/// Fails with [`KvsError::InvalidHeader`] if a header cannot go on the wire,
/// and with [`KvsError::Signing`] if the path is not a valid request target.
pub fn sign_at(
    spec: &mut RequestSpec,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<()> {
    if spec.header("host").is_none() {
        let host = spec.host.clone();
        spec.set_header("Host", host);
    }
    spec.headers.retain(|k, _| !k.eq_ignore_ascii_case("authorization"));

    let mut headers = Vec::with_capacity(spec.headers.len());
    for (name, value) in &spec.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| KvsError::InvalidHeader(name.clone()))?;
        HeaderValue::from_str(value).map_err(|_| KvsError::InvalidHeader(name.clone()))?;
        headers.push((name.to_ascii_lowercase(), value.clone()));
    }

    let signed = sign_headers(spec, &headers, credentials, now)?;
    for (name, value) in signed {
        spec.set_header(&name, value);
    }
    Ok(())
}

/// Run the SigV4 signer and return the headers it asks to add.
fn sign_headers(
    spec: &RequestSpec,
    headers: &[(String, String)],
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>> {
    let identity: Identity = AwsCredentials::new(
        &credentials.access_key_id,
        &credentials.secret_access_key,
        None,
        None,
        "ksyun-kvs",
    )
    .into();

    let signing_params = SigningParams::builder()
        .identity(&identity)
        .region(&credentials.region)
        .name(&spec.service)
        .time(SystemTime::from(now))
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| KvsError::Signing(e.to_string()))?
        .into();

    let signable_request = SignableRequest::new(
        spec.method.as_str(),
        spec.path.as_str(),
        headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        SignableBody::Bytes(spec.body.as_bytes()),
    )
    .map_err(|e| KvsError::Signing(e.to_string()))?;

    let (instructions, _signature) = sigv4_sign(signable_request, &signing_params)
        .map_err(|e| KvsError::Signing(e.to_string()))?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
