use std::time::Duration;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::action::resolve;
use crate::errors::{KvsError, Result, STATUS_ABORTED};
use crate::models::{
    json_type_name, query_values, RawResponse, Reply, RequestOptions, SignedRequest,
};
use crate::signer::{self, Credentials, RequestSpec};

const DEFAULT_HOST: &str = "kvs.cn-beijing-6.api.ksyun.com";
const DEFAULT_REGION: &str = "us-east-1";
const SERVICE: &str = "kvs";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60000);

const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=utf-8";
const DEFAULT_ACCEPT: &str = "application/json";

/// Unreserved characters per RFC 3986 stay as-is, everything else is escaped.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Static settings a [`Client`] is constructed from.
///
/// Field names deserialize in camelCase (`apiVersion`, `accessKeyId`, ...), so
/// the struct can be loaded straight from a JSON config file.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub api_version: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl ClientConfig {
    /// Config for the default host.
    pub fn new(
        api_version: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            host: default_host(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_version", &self.api_version)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

/// Builder for constructing a [`Client`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use ksyun_kvs::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> ksyun_kvs::Result<()> {
/// let client = ClientBuilder::new()
///     .api_version("2017-01-01")
///     .access_key_id("AKLT...")
///     .secret_access_key("secret")
///     .timeout(Duration::from_secs(120))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_version: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    host: String,
    endpoint: Option<String>,
    region: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            api_version: None,
            access_key_id: None,
            secret_access_key: None,
            host: DEFAULT_HOST.to_string(),
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Seed a builder from `KVS_API_VERSION`, `KVS_ACCESS_KEY_ID`,
    /// `KVS_SECRET_ACCESS_KEY` and, when set, `KVS_HOST`, `KVS_ENDPOINT`
    /// and `KVS_REGION`.
    ///
    /// Missing required variables surface as [`KvsError::MissingConfig`] from
    /// [`build`](Self::build), unless set on the builder afterwards.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut builder = Self::new();
        builder.api_version = var("KVS_API_VERSION");
        builder.access_key_id = var("KVS_ACCESS_KEY_ID");
        builder.secret_access_key = var("KVS_SECRET_ACCESS_KEY");
        if let Some(host) = var("KVS_HOST") {
            builder.host = host;
        }
        builder.endpoint = var("KVS_ENDPOINT");
        if let Some(region) = var("KVS_REGION") {
            builder.region = region;
        }
        builder
    }

    /// API version sent as the `Version` query parameter.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn access_key_id(mut self, key: impl Into<String>) -> Self {
        self.access_key_id = Some(key.into());
        self
    }

    pub fn secret_access_key(mut self, secret: impl Into<String>) -> Self {
        self.secret_access_key = Some(secret.into());
        self
    }

    /// Host that requests are signed for (defaults to `kvs.cn-beijing-6.api.ksyun.com`).
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Send requests somewhere other than `https://{host}`, e.g. through a proxy.
    /// The signature still covers the configured host.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Region in the signing scope (defaults to `us-east-1`).
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Time allowed to establish a connection (defaults to 3 seconds).
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Time allowed for the whole response (defaults to 60 seconds).
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Build the [`Client`].
    ///
    /// Returns [`KvsError::MissingConfig`] if the API version or either half of
    /// the key pair is missing or empty.
    pub fn build(self) -> Result<Client> {
        let api_version = required(self.api_version, "apiVersion")?;
        let access_key_id = required(self.access_key_id, "accessKeyId")?;
        let secret_access_key = required(self.secret_access_key, "secretAccessKey")?;

        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(KvsError::Transport)?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| format!("https://{}", self.host))
            .trim_end_matches('/')
            .to_string();

        Ok(Client {
            api_version,
            credentials: Credentials {
                access_key_id,
                secret_access_key,
                region: self.region,
            },
            host: self.host,
            endpoint,
            http,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ClientConfig> for ClientBuilder {
    fn from(config: ClientConfig) -> Self {
        Self::new()
            .api_version(config.api_version)
            .access_key_id(config.access_key_id)
            .secret_access_key(config.secret_access_key)
            .host(config.host)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(KvsError::MissingConfig(field))
}

/// The KVS API client.
///
/// Configuration is fixed at construction, so one client can serve concurrent
/// calls from many tasks.
///
/// # Example
///
/// ```no_run
/// use ksyun_kvs::{Client, ClientConfig};
/// use serde_json::json;
///
/// # async fn example() -> ksyun_kvs::Result<()> {
/// let client = Client::new(ClientConfig::new("2017-01-01", "AKLT...", "secret"))?;
///
/// let tasks = client
///     .call("GetTaskList", Some(json!({ "Limit": 10 })))
///     .await?;
/// println!("{tasks}");
/// # Ok(())
/// # }
/// ```
pub struct Client {
    api_version: String,
    credentials: Credentials,
    host: String,
    endpoint: String,
    http: reqwest::Client,
}

impl Client {
    /// Create a client from a [`ClientConfig`] with default timeouts.
    ///
    /// For customization, use [`ClientBuilder`] instead.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from(config).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL requests are sent to, `https://{host}` unless overridden.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Signing service name, always `kvs`.
    pub fn service(&self) -> &'static str {
        SERVICE
    }

    /// Invoke `action` and return the parsed response body.
    ///
    /// `params` ride the query string for GET actions and become the JSON body
    /// otherwise. When `options.raw` is set the response is returned as
    /// [`Reply::Raw`] without any status checks.
    ///
    /// # Errors
    ///
    /// - [`KvsError::InvalidAction`] / [`KvsError::InvalidParams`] before any I/O.
    /// - [`KvsError::Transport`] if the call could not be made.
    /// - [`KvsError::Http`] / [`KvsError::Aborted`] for failing HTTP responses.
    /// - [`KvsError::Application`] when the body carries a non-zero `ErrNum`.
    pub async fn request(
        &self,
        action: &str,
        params: Option<Value>,
        options: Option<RequestOptions>,
    ) -> Result<Reply> {
        let options = options.unwrap_or_default();
        let signed = self.prepare(action, params.as_ref(), &options)?;
        let raw = self.send(signed).await?;

        if options.raw {
            return Ok(Reply::Raw(raw));
        }
        classify(raw).map(Reply::Data)
    }

    /// Shorthand for [`request`](Self::request) with no overrides.
    pub async fn call(&self, action: &str, params: Option<Value>) -> Result<Value> {
        match self.request(action, params, None).await? {
            Reply::Data(body) => Ok(body),
            Reply::Raw(raw) => classify(raw),
        }
    }

    /// Shorthand for [`request`](Self::request) in raw mode.
    pub async fn call_raw(&self, action: &str, params: Option<Value>) -> Result<RawResponse> {
        let options = RequestOptions::new().raw(true);
        match self.request(action, params, Some(options)).await? {
            Reply::Raw(raw) => Ok(raw),
            Reply::Data(_) => unreachable!("raw mode always yields Reply::Raw"),
        }
    }

    /// Build and sign the request for `action` without sending it.
    pub fn prepare(
        &self,
        action: &str,
        params: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<SignedRequest> {
        self.prepare_at(action, params, options, Utc::now())
    }

    pub(crate) fn prepare_at(
        &self,
        action: &str,
        params: Option<&Value>,
        options: &RequestOptions,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let mut spec = self.build_spec(action, params, options)?;
        signer::sign_at(&mut spec, &self.credentials, now)?;

        Ok(SignedRequest {
            url: format!("{}{}", self.endpoint, spec.path),
            method: spec.method,
            path: spec.path,
            headers: spec.headers,
            body: spec.body,
        })
    }

    /// Layer defaults, the routed action and caller overrides into an unsigned spec.
    fn build_spec(
        &self,
        action: &str,
        params: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<RequestSpec> {
        let routed = resolve(action)?;

        let params = match params {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(KvsError::InvalidParams(json_type_name(other).to_string()));
            }
        };

        // Defaults.
        let mut spec = RequestSpec {
            method: Method::GET,
            host: self.host.clone(),
            path: "/".to_string(),
            headers: Default::default(),
            body: String::new(),
            service: SERVICE.to_string(),
        };
        spec.set_header("Content-Type", DEFAULT_CONTENT_TYPE);
        spec.set_header("Accept", DEFAULT_ACCEPT);

        // Routed action.
        spec.method = routed.method;
        spec.path = routed.path.to_string();

        // Caller overrides.
        if let Some(method) = &options.method {
            spec.method = method.clone();
        }
        if let Some(path) = &options.path {
            spec.path = path.clone();
        }
        for (name, value) in &options.headers {
            spec.set_header(name, value.as_str());
        }

        let (pathname, existing) = match spec.path.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (spec.path.clone(), String::new()),
        };
        let pathname = if pathname.is_empty() {
            "/".to_string()
        } else {
            pathname
        };
        let mut query: Vec<(String, String)> = url::form_urlencoded::parse(existing.as_bytes())
            .into_owned()
            .collect();

        if let Some(params) = params {
            if spec.method == Method::GET {
                for (key, value) in params {
                    query.retain(|(k, _)| k != key);
                    query.extend(query_values(value).into_iter().map(|v| (key.clone(), v)));
                }
            } else {
                spec.body = serde_json::to_string(params)
                    .map_err(|e| KvsError::InvalidParams(e.to_string()))?;
            }
        }

        // Protocol fields always win over caller parameters.
        query.retain(|(k, _)| k != "Action" && k != "Version");
        query.push(("Action".to_string(), action.to_string()));
        query.push(("Version".to_string(), self.api_version.clone()));

        spec.path = format!("{pathname}?{}", encode_query(&mut query));

        debug!(action, method = %spec.method, path = %spec.path, "prepared KVS request");
        Ok(spec)
    }

    async fn send(&self, signed: SignedRequest) -> Result<RawResponse> {
        let mut headers = HeaderMap::with_capacity(signed.headers.len());
        for (name, value) in &signed.headers {
            // Derived from the endpoint URL by the transport.
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| KvsError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| KvsError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        let mut req = self
            .http
            .request(signed.method.clone(), &signed.url)
            .headers(headers);
        if !signed.body.is_empty() {
            req = req.body(signed.body);
        }

        let response = req.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        // A timeout is a transport failure wherever it fires; anything else
        // cutting the body short is an abort.
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                KvsError::Transport(e)
            } else {
                KvsError::Aborted {
                    status: STATUS_ABORTED,
                    message: e.to_string(),
                }
            }
        })?;

        trace!(status = status.as_u16(), bytes = body.len(), "received KVS response");

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Sort by key (keeping repeated keys in order) and percent-encode.
fn encode_query(query: &mut [(String, String)]) -> String {
    query.sort_by(|a, b| a.0.cmp(&b.0));
    query
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, RFC3986),
                utf8_percent_encode(v, RFC3986)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Turn a received response into the parsed body or a typed failure.
fn classify(raw: RawResponse) -> Result<Value> {
    if raw.status > 399 {
        let parsed: Option<Value> = serde_json::from_str(&raw.body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.pointer("/Error/Message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| raw.status_text.clone());
        let body = parsed.or_else(|| (!raw.body.is_empty()).then(|| Value::String(raw.body)));

        debug!(status = raw.status, %message, "KVS request failed");
        return Err(KvsError::Http {
            status: raw.status,
            message,
            body,
        });
    }

    let body = raw.json()?;
    // Only a numeric zero counts as success, `0.0` included; `"0"` does not.
    let err_num = body.get("ErrNum");
    if matches!(err_num, Some(Value::Number(n)) if n.as_f64() == Some(0.0)) {
        return Ok(body);
    }

    let code = err_num.and_then(Value::as_i64).unwrap_or(-1);
    let fallback = if err_num.is_some() {
        "no ErrMsg"
    } else {
        "response carries no ErrNum"
    };
    let message = body
        .get("ErrMsg")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback)
        .to_string();

    debug!(err_num = code, %message, "KVS application error");
    Err(KvsError::Application {
        err_num: code,
        message,
        body,
    })
}
