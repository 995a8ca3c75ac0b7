use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ClientError;
use crate::hooks::Hooks;
use crate::interpret::{interpret, Payload, RawResponse};
use crate::make_request::{ensure_success, make_request, url_path_segment};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_VERSION: ApiVersion = ApiVersion::V7_7;
pub const DEFAULT_CLIENT_ID: &str = "sugar";
pub const DEFAULT_PLATFORM: &str = "base";

const SERVICE_NAME: &str = "SugarCRM REST";

/// Server versions with a known REST path.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ApiVersion {
    #[default]
    V7_7,
    V7_8,
    V7_9,
    V7_10,
    V7_11,
    V8_0,
    V8_1,
    V8_2,
    V8_3,
}

const VERSIONS: &[(&str, ApiVersion, &str)] = &[
    ("7.7", ApiVersion::V7_7, "rest/v10/"),
    ("7.8", ApiVersion::V7_8, "rest/v10/"),
    ("7.9", ApiVersion::V7_9, "rest/v10/"),
    ("7.10", ApiVersion::V7_10, "rest/v11/"),
    ("7.11", ApiVersion::V7_11, "rest/v11_1/"),
    ("8.0", ApiVersion::V8_0, "rest/v11_1/"),
    ("8.1", ApiVersion::V8_1, "rest/v11_2/"),
    ("8.2", ApiVersion::V8_2, "rest/v11_3/"),
    ("8.3", ApiVersion::V8_3, "rest/v11_4/"),
];

impl ApiVersion {
    fn entry(&self) -> &'static (&'static str, ApiVersion, &'static str) {
        VERSIONS
            .iter()
            .find(|(_, version, _)| version == self)
            .unwrap_or(&VERSIONS[0])
    }

    pub fn as_str(&self) -> &'static str {
        self.entry().0
    }

    /// REST path segment relative to the server root, e.g. `rest/v11_4/`.
    pub fn rest_path(&self) -> &'static str {
        self.entry().2
    }
}

impl FromStr for ApiVersion {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VERSIONS
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|(_, version, _)| *version)
            .ok_or_else(|| ClientError::UnsupportedVersion(s.to_string()))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token response from the `oauth2/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: SecretString,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    #[serde(default)]
    pub download_token: Option<SecretString>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    url: Option<String>,
    version: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    platform: Option<String>,
    verify: Option<bool>,
    http_client: Option<reqwest::Client>,
    hooks: Hooks,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server root, e.g. `https://crm.example.com/`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Server version such as `"8.3"`. Checked against the version table on
    /// `build`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: SecretString) -> Self {
        self.client_secret = Some(client_secret);
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client without contacting the server. Call
    /// [`Client::get_token`] or [`Client::set_token`] before authenticated
    /// calls.
    pub fn build(self) -> Result<Client, ClientError> {
        let url = self.url.ok_or_else(|| {
            ClientError::Configuration("SugarCRM REST url is required".to_string())
        })?;
        let version = match self.version {
            Some(version) => version.parse()?,
            None => DEFAULT_VERSION,
        };
        let base_url = base_url(&url, version)?;

        let (http_client, timeout) = match self.http_client {
            Some(http_client) => (http_client, self.timeout),
            None => {
                let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
                let http_client = reqwest::Client::builder()
                    .timeout(timeout)
                    .danger_accept_invalid_certs(!self.verify.unwrap_or(true))
                    .build()
                    .map_err(ClientError::Reqwest)?;
                (http_client, Some(timeout))
            }
        };

        Ok(Client {
            http_client,
            base_url,
            version,
            client_id: self
                .client_id
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            client_secret: self
                .client_secret
                .unwrap_or_else(|| SecretString::from(String::new())),
            platform: self
                .platform
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            access_token: None,
            refresh_token: None,
            hooks: self.hooks,
            timeout,
        })
    }
}

/// Joins the server root with the REST path of `version`.
pub fn base_url(url: &str, version: ApiVersion) -> Result<Url, ClientError> {
    let invalid = || {
        ClientError::InvalidUrl(format!(
            "Please check your url '{url}' has a valid schema: 'http://', 'https://'"
        ))
    };
    let mut root = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(root.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(version.rest_path()).map_err(|_| invalid())
}

/// Client for the OAuth2 REST API (`rest/v10` and later).
#[derive(Clone, Debug)]
pub struct Client {
    http_client: reqwest::Client,
    base_url: Url,
    version: ApiVersion,
    client_id: String,
    client_secret: SecretString,
    platform: String,
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    hooks: Hooks,
    timeout: Option<Duration>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Installs a bearer token obtained elsewhere.
    pub fn set_token(&mut self, access_token: SecretString) {
        self.access_token = Some(access_token);
    }

    /// Exchanges a username and password for a bearer token and installs it.
    #[tracing::instrument(name = "SugarCRM REST: Get token", skip(self, password))]
    pub async fn get_token(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<TokenResponse, ClientError> {
        let body = json!({
            "grant_type": "password",
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "username": username,
            "password": password.expose_secret(),
            "platform": self.platform,
        });

        let token = self.exchange(&body).await?;
        self.install(&token);
        Ok(token)
    }

    /// Trades the stored refresh token for a new bearer token.
    #[tracing::instrument(name = "SugarCRM REST: Refresh token", skip(self))]
    pub async fn refresh_token(&mut self) -> Result<TokenResponse, ClientError> {
        let refresh_token = self.refresh_token.as_ref().ok_or(ClientError::MissingToken)?;
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token.expose_secret(),
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "platform": self.platform,
        });

        let token = self.exchange(&body).await?;
        self.install(&token);
        Ok(token)
    }

    #[tracing::instrument(name = "SugarCRM REST: Logout", skip(self))]
    pub async fn logout(&mut self) -> Result<Payload, ClientError> {
        let payload = self.call(Method::POST, "oauth2/logout", None).await?;
        self.access_token = None;
        self.refresh_token = None;
        Ok(payload)
    }

    #[tracing::instrument(name = "SugarCRM REST: Current user", skip(self))]
    pub async fn me(&self) -> Result<Payload, ClientError> {
        self.call(Method::GET, "me", None).await
    }

    #[tracing::instrument(name = "SugarCRM REST: Get record", skip(self))]
    pub async fn get_record(&self, module_name: &str, id: &str) -> Result<Payload, ClientError> {
        let path = record_path(module_name, id);
        self.call(Method::GET, &path, None).await
    }

    /// Runs a filter query, e.g. `{"filter": [{"status": "New"}], "max_num": 20}`.
    #[tracing::instrument(name = "SugarCRM REST: Filter records", skip(self, filter))]
    pub async fn filter_records(
        &self,
        module_name: &str,
        filter: &Value,
    ) -> Result<Payload, ClientError> {
        let path = format!("{}/filter", url_path_segment(module_name));
        self.call(Method::POST, &path, Some(filter)).await
    }

    #[tracing::instrument(name = "SugarCRM REST: Create record", skip(self, fields))]
    pub async fn create_record(
        &self,
        module_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Payload, ClientError> {
        let body = Value::Object(fields.clone());
        self.call(Method::POST, &url_path_segment(module_name), Some(&body))
            .await
    }

    #[tracing::instrument(name = "SugarCRM REST: Update record", skip(self, fields))]
    pub async fn update_record(
        &self,
        module_name: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Payload, ClientError> {
        let body = Value::Object(fields.clone());
        let path = record_path(module_name, id);
        self.call(Method::PUT, &path, Some(&body)).await
    }

    #[tracing::instrument(name = "SugarCRM REST: Delete record", skip(self))]
    pub async fn delete_record(&self, module_name: &str, id: &str) -> Result<Payload, ClientError> {
        let path = record_path(module_name, id);
        self.call(Method::DELETE, &path, None).await
    }

    /// Sends an authenticated request to `path`, relative to the versioned
    /// base URL.
    #[tracing::instrument(name = "SugarCRM REST: Call", skip(self, body))]
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Payload, ClientError> {
        let access_token = self.access_token.as_ref().ok_or(ClientError::MissingToken)?;
        let url = self.endpoint(path)?;

        let mut request = self
            .http_client
            .request(method, url)
            .bearer_auth(access_token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = make_request(
            &self.http_client,
            request,
            &self.hooks,
            self.timeout,
            SERVICE_NAME,
        )
        .await?;

        interpret(ensure_success(response)?)
    }

    async fn exchange(&self, body: &Value) -> Result<TokenResponse, ClientError> {
        let url = self.endpoint("oauth2/token")?;
        let request = self.http_client.post(url).json(body);
        let response = make_request(
            &self.http_client,
            request,
            &self.hooks,
            self.timeout,
            SERVICE_NAME,
        )
        .await?;

        if let Some(message) = invalid_grant(&response) {
            return Err(ClientError::InvalidLogin(message));
        }

        let payload = interpret(ensure_success(response)?)?.into_json()?;
        serde_json::from_value(payload).map_err(|err| {
            tracing::error!("{SERVICE_NAME}: failed to parse token response: {}", err);
            ClientError::Serde(err)
        })
    }

    fn install(&mut self, token: &TokenResponse) {
        self.access_token = Some(token.access_token.clone());
        if let Some(refresh_token) = &token.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Configuration(format!("{SERVICE_NAME}: invalid URL: {}", e)))
    }
}

fn record_path(module_name: &str, id: &str) -> String {
    format!("{}/{}", url_path_segment(module_name), url_path_segment(id))
}

/// The token endpoint rejects bad credentials with a 400 and
/// `"error": "invalid_grant"`.
fn invalid_grant(response: &RawResponse) -> Option<String> {
    if response.status != StatusCode::BAD_REQUEST {
        return None;
    }
    let body: Value = serde_json::from_str(&response.body).ok()?;
    if body.get("error").and_then(Value::as_str) != Some("invalid_grant") {
        return None;
    }
    let message = body
        .get("error_message")
        .or_else(|| body.get("error_description"))
        .and_then(Value::as_str)
        .unwrap_or("invalid_grant");
    Some(message.to_string())
}
