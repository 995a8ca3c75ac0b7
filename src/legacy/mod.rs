use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::hooks::Hooks;
use crate::interpret::{interpret, Payload};
use crate::make_request::make_request;
use crate::models::name_value::link_fields;
use crate::models::{
    name_value_list, GetEntriesCountOptions, GetEntriesOptions, GetEntryListOptions,
    GetModuleFieldsOptions, GetRelationshipsOptions, SearchByModuleOptions,
    SetRelationshipOptions,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_APPLICATION: &str = "sugarcrm-rust";
pub const DEFAULT_LANGUAGE: &str = "en_US";
pub const REST_PATH: &str = "service/v4_1/rest.php";

const SERVICE_NAME: &str = "SugarCRM";

/// Which module list `get_available_modules` returns.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFilter {
    #[default]
    Default,
    Mobile,
    All,
}

impl ModuleFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleFilter::Default => "default",
            ModuleFilter::Mobile => "mobile",
            ModuleFilter::All => "all",
        }
    }
}

/// Attachment payload for `set_note_attachment`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NoteAttachment {
    /// The Note holding the attachment.
    pub id: String,
    pub filename: String,
    /// Base64 encoded file contents.
    pub file: String,
    pub related_module_id: Option<String>,
    pub related_module_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    url: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    application: Option<String>,
    language: Option<String>,
    verify: Option<bool>,
    http_client: Option<reqwest::Client>,
    hooks: Hooks,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server root, e.g. `https://crm.example.com/`. The `service/v4_1/rest.php`
    /// suffix is appended when missing.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Disabling verification only affects the internally built transport.
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

    /// Builds the client and logs in. No client is returned unless the
    /// server issued a session id.
    pub async fn build(self) -> Result<Client, ClientError> {
        let url = self.url.ok_or_else(|| {
            ClientError::Configuration("SugarCRM url is required".to_string())
        })?;
        let username = self.username.ok_or_else(|| {
            ClientError::Configuration("SugarCRM username is required".to_string())
        })?;
        let password = self.password.ok_or_else(|| {
            ClientError::Configuration("SugarCRM password is required".to_string())
        })?;

        let url = endpoint_url(&url)?;

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

        let mut client = Client {
            http_client,
            url,
            session_id: SecretString::from(String::new()),
            hooks: self.hooks,
            timeout,
        };

        let application = self
            .application
            .unwrap_or_else(|| DEFAULT_APPLICATION.to_string());
        let language = self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        client.session_id = client
            .login(&username, &password, &application, &language)
            .await?;

        Ok(client)
    }
}

/// Normalizes a server URL into the legacy REST endpoint.
pub fn endpoint_url(url: &str) -> Result<Url, ClientError> {
    let mut endpoint = url.to_string();
    if !endpoint.ends_with(&format!("/{REST_PATH}")) {
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        endpoint.push_str(REST_PATH);
    }

    let invalid = || {
        ClientError::InvalidUrl(format!(
            "Please check your url '{url}' has a valid schema: 'http://', 'https://'"
        ))
    };
    let endpoint = Url::parse(&endpoint).map_err(|_| invalid())?;
    match endpoint.scheme() {
        "http" | "https" => Ok(endpoint),
        _ => Err(invalid()),
    }
}

pub(crate) fn password_digest(password: &SecretString) -> String {
    hex::encode(Md5::digest(password.expose_secret().as_bytes()))
}

/// Client for the session based `v4_1` REST endpoint.
#[derive(Clone, Debug)]
pub struct Client {
    http_client: reqwest::Client,
    url: Url,
    session_id: SecretString,
    hooks: Hooks,
    timeout: Option<Duration>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn session_id(&self) -> &SecretString {
        &self.session_id
    }

    #[tracing::instrument(name = "SugarCRM: Login", skip(self, password))]
    async fn login(
        &self,
        username: &str,
        password: &SecretString,
        application: &str,
        language: &str,
    ) -> Result<SecretString, ClientError> {
        let rest_data = json!([
            {
                "user_name": username,
                "password": password_digest(password),
            },
            application,
            [{"name": "language", "value": language}],
        ]);

        let response = self.post("login", rest_data).await?.into_json()?;
        match response.get("id").and_then(Value::as_str) {
            Some(id) => Ok(SecretString::from(id.to_string())),
            None => {
                tracing::error!("{SERVICE_NAME}: login response has no session id");
                Err(ClientError::UnexpectedResponse(
                    "login response has no session id".to_string(),
                ))
            }
        }
    }

    async fn post(&self, method: &'static str, rest_data: Value) -> Result<Payload, ClientError> {
        let mut url = self.url.clone();
        url.set_query(Some(method));

        let rest_data = serde_json::to_string(&rest_data)?;
        let form = [
            ("method", method),
            ("input_type", "JSON"),
            ("response_type", "JSON"),
            ("rest_data", rest_data.as_str()),
        ];

        let request = self.http_client.post(url).form(&form);
        let response = make_request(
            &self.http_client,
            request,
            &self.hooks,
            self.timeout,
            SERVICE_NAME,
        )
        .await?;

        interpret(response)
    }

    fn session(&self) -> &str {
        self.session_id.expose_secret()
    }

    #[tracing::instrument(name = "SugarCRM: Get available modules", skip(self))]
    pub async fn get_available_modules(
        &self,
        filter: ModuleFilter,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([self.session(), filter.as_str()]);
        self.post("get_available_modules", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get entries", skip(self, ids, options))]
    pub async fn get_entries(
        &self,
        module_name: &str,
        ids: &[impl AsRef<str>],
        options: &GetEntriesOptions,
    ) -> Result<Payload, ClientError> {
        let ids: Vec<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let rest_data = json!([
            self.session(),
            module_name,
            ids,
            options.select_fields,
            link_fields(&options.link_name_to_fields_array),
            options.track_view,
        ]);
        self.post("get_entries", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get entries count", skip(self, options))]
    pub async fn get_entries_count(
        &self,
        module_name: &str,
        options: &GetEntriesCountOptions,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([
            self.session(),
            module_name,
            options.query,
            i32::from(options.deleted),
        ]);
        self.post("get_entries_count", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get entry", skip(self, options))]
    pub async fn get_entry(
        &self,
        module_name: &str,
        id: &str,
        options: &GetEntriesOptions,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([
            self.session(),
            module_name,
            id,
            options.select_fields,
            link_fields(&options.link_name_to_fields_array),
            options.track_view,
        ]);
        self.post("get_entry", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get entry list", skip(self, options))]
    pub async fn get_entry_list(
        &self,
        module_name: &str,
        options: &GetEntryListOptions,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([
            self.session(),
            module_name,
            options.query,
            options.order_by,
            options.offset,
            options.select_fields,
            link_fields(&options.link_name_to_fields_array),
            options.max_results,
            i32::from(options.deleted),
            options.favorites,
        ]);
        self.post("get_entry_list", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get module fields", skip(self, options))]
    pub async fn get_module_fields(
        &self,
        module_name: &str,
        options: &GetModuleFieldsOptions,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([self.session(), module_name, options.fields]);
        self.post("get_module_fields", rest_data).await
    }

    /// Creates or updates several records, one name/value list per record.
    #[tracing::instrument(name = "SugarCRM: Set entries", skip(self, records))]
    pub async fn set_entries<I, R, K, V>(
        &self,
        module_name: &str,
        records: I,
    ) -> Result<Payload, ClientError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let records: Vec<Value> = records
            .into_iter()
            .map(|record| {
                Value::Array(name_value_list(record).into_iter().map(Value::from).collect())
            })
            .collect();
        let rest_data = json!([self.session(), module_name, records]);
        self.post("set_entries", rest_data).await
    }

    /// Creates or updates a single record. Without an `id` field a new
    /// record is created.
    #[tracing::instrument(name = "SugarCRM: Set entry", skip(self, fields))]
    pub async fn set_entry<I, K, V>(
        &self,
        module_name: &str,
        fields: I,
    ) -> Result<Payload, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let fields: Vec<Value> = name_value_list(fields).into_iter().map(Value::from).collect();
        let rest_data = json!([self.session(), module_name, fields]);
        self.post("set_entry", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Get relationships", skip(self, options))]
    pub async fn get_relationships(
        &self,
        module_name: &str,
        module_id: &str,
        link_field_name: &str,
        options: &GetRelationshipsOptions,
    ) -> Result<Payload, ClientError> {
        let limit = match options.limit {
            Some(limit) => json!(limit),
            None => json!(false),
        };
        let rest_data = json!([
            self.session(),
            module_name,
            module_id,
            link_field_name,
            options.related_module_query,
            options.related_fields,
            options.related_module_link_name_to_fields_array,
            i32::from(options.deleted),
            options.order_by,
            options.offset,
            limit,
        ]);
        self.post("get_relationships", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Search by module", skip(self, modules, options))]
    pub async fn search_by_module(
        &self,
        search_string: &str,
        modules: &[impl AsRef<str>],
        options: &SearchByModuleOptions,
    ) -> Result<Payload, ClientError> {
        let modules: Vec<&str> = modules.iter().map(|module| module.as_ref()).collect();
        let rest_data = json!([
            self.session(),
            search_string,
            modules,
            options.offset,
            options.max_results,
            options.assigned_user_id,
            options.select_fields,
            options.unified_search_only,
            options.favorites,
        ]);
        self.post("search_by_module", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Set note attachment", skip(self, attachment))]
    pub async fn set_note_attachment(
        &self,
        attachment: &NoteAttachment,
    ) -> Result<Payload, ClientError> {
        let rest_data = json!([self.session(), attachment]);
        self.post("set_note_attachment", rest_data).await
    }

    #[tracing::instrument(name = "SugarCRM: Set relationship", skip(self, related_ids, options))]
    pub async fn set_relationship(
        &self,
        module_name: &str,
        module_id: &str,
        link_field_name: &str,
        related_ids: &[impl AsRef<str>],
        options: &SetRelationshipOptions,
    ) -> Result<Payload, ClientError> {
        let related_ids: Vec<&str> = related_ids.iter().map(|id| id.as_ref()).collect();
        let rest_data = json!([
            self.session(),
            module_name,
            module_id,
            link_field_name,
            related_ids,
            options.name_value_list,
            i32::from(options.delete),
        ]);
        self.post("set_relationship", rest_data).await
    }
}

macro_rules! not_implemented {
    ($($method:ident),+ $(,)?) => {
        impl Client {
            $(
                #[doc = concat!(
                    "`",
                    stringify!($method),
                    "` is not supported yet and always fails."
                )]
                pub fn $method(&self) -> Result<Payload, ClientError> {
                    Err(ClientError::NotImplemented(stringify!($method)))
                }
            )+
        }
    };
}

not_implemented!(
    get_document_revision,
    get_language_definition,
    get_last_viewed,
    get_modified_relationships,
    get_module_fields_md5,
    get_module_layout,
    get_module_layout_md5,
    get_note_attachment,
    get_quotes_pdf,
    get_report_entries,
    get_report_pdf,
    get_server_info,
    get_upcoming_activities,
    get_user_id,
    get_user_team_id,
    job_queue_cycle,
    job_queue_next,
    job_queue_run,
    logout,
    oauth_access,
    seamless_login,
    set_campaign_merge,
    set_document_revision,
    set_relationships,
    snip_import_emails,
    snip_update_contacts,
);

#[cfg(test)]
mod tests {
    use claim::{assert_matches, assert_ok};
    use secrecy::SecretString;

    use super::{endpoint_url, password_digest};
    use crate::error::ClientError;

    #[test]
    fn rest_path_is_appended() {
        let url = assert_ok!(endpoint_url("https://crm.example.com"));
        assert_eq!(url.as_str(), "https://crm.example.com/service/v4_1/rest.php");
    }

    #[test]
    fn rest_path_is_not_duplicated() {
        let url = assert_ok!(endpoint_url("http://crm.example.com/sugar/service/v4_1/rest.php"));
        assert_eq!(url.as_str(), "http://crm.example.com/sugar/service/v4_1/rest.php");
    }

    #[test]
    fn url_without_scheme_is_rejected() {
        assert_matches!(endpoint_url("crm.example.com"), Err(ClientError::InvalidUrl(_)));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert_matches!(endpoint_url("ftp://crm.example.com"), Err(ClientError::InvalidUrl(_)));
    }

    #[test]
    fn password_is_md5_hex() {
        let password = SecretString::from("password".to_string());
        assert_eq!(password_digest(&password), "5f4dcc3b5aa765d61d8327deb882cf99");
    }
}
