use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;

use crate::error::ClientError;
use crate::hooks::Hooks;
use crate::interpret::RawResponse;

/// Sends one request and captures the response as plain data. Hooks see the
/// response before its body is consumed.
pub(crate) async fn make_request(
    http_client: &reqwest::Client,
    request: RequestBuilder,
    hooks: &Hooks,
    timeout: Option<Duration>,
    service_name: &str,
) -> Result<RawResponse, ClientError> {
    let request = match timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    };
    let req = request.build()?;

    let resp = http_client.execute(req).await.map_err(|err| {
        tracing::error!("{service_name}: failed to send request: {}", err);
        match timeout {
            Some(timeout) if err.is_timeout() => ClientError::Timeout(timeout.as_secs()),
            _ => ClientError::Reqwest(err),
        }
    })?;

    hooks.run_response(&resp);

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.map_err(|err| {
        tracing::error!("{service_name}: failed to read response body: {}", err);
        ClientError::Reqwest(err)
    })?;

    Ok(RawResponse {
        status,
        content_type,
        body,
    })
}

/// Applies the status rules of the REST API: 401 is an authentication
/// failure and any other non-2xx status is a server error.
pub(crate) fn ensure_success(response: RawResponse) -> Result<RawResponse, ClientError> {
    let status_code = response.status;
    if status_code.is_success() {
        Ok(response)
    } else if status_code.as_u16() == 401 {
        Err(ClientError::Authentication(response.body))
    } else {
        Err(ClientError::ServerResponse {
            status_code,
            message: response.body,
        })
    }
}

pub(crate) fn url_path_segment<T: AsRef<str>>(s: T) -> String {
    url::form_urlencoded::byte_serialize(s.as_ref().as_bytes()).collect()
}
