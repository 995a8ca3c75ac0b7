#[cfg(test)]
mod tests {
    use claim::{assert_matches, assert_ok};
    use fake::{Fake, Faker};
    use reqwest::Method;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::{json, Value};
    use sugarcrm_client::oauth::{ApiVersion, Client};
    use sugarcrm_client::{ClientError, Payload};
    use wiremock::matchers::{any, bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rest_client(base_url: &str) -> Client {
        Client::builder()
            .url(base_url)
            .version("8.3")
            .timeout(std::time::Duration::from_secs(1))
            .build()
            .unwrap()
    }

    fn token_body() -> Value {
        json!({
            "access_token": "access-1",
            "expires_in": 3600,
            "token_type": "bearer",
            "scope": null,
            "refresh_token": "refresh-1",
            "download_token": "download-1"
        })
    }

    async fn mount_token(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/rest/v11_4/oauth2/token"))
            .and(body_partial_json(json!({"grant_type": "password"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .mount(mock_server)
            .await;
    }

    fn password() -> SecretString {
        SecretString::from(Faker.fake::<String>())
    }

    #[test]
    fn version_selects_rest_path() {
        let client = rest_client("https://crm.example.com");

        assert_eq!(client.version(), ApiVersion::V8_3);
        assert_eq!(
            client.base_url().as_str(),
            "https://crm.example.com/rest/v11_4/"
        );
    }

    #[test]
    fn unsupported_version_fails_construction() {
        let outcome = Client::builder()
            .url("https://crm.example.com")
            .version("9.9")
            .build();

        assert_matches!(
            outcome,
            Err(ClientError::UnsupportedVersion(ref version)) if version == "9.9"
        );
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        assert_matches!(Client::builder().build(), Err(ClientError::Configuration(_)));
    }

    #[tokio::test]
    async fn get_token_sends_password_grant() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/rest/v11_4/oauth2/token"))
            .and(body_partial_json(json!({
                "grant_type": "password",
                "client_id": "sugar",
                "client_secret": "",
                "username": "admin",
                "password": "hunter2",
                "platform": "base"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let token = client
            .get_token("admin", &SecretString::from("hunter2".to_string()))
            .await;

        let token = assert_ok!(token);
        assert_eq!(token.access_token.expose_secret(), "access-1");
        assert_eq!(token.expires_in, Some(3600));
        assert!(client.has_token());
    }

    #[tokio::test]
    async fn invalid_grant_is_an_invalid_login() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());

        Mock::given(any())
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_message": "Your username or password was incorrect."
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client.get_token("admin", &password()).await;

        assert_matches!(
            outcome,
            Err(ClientError::InvalidLogin(ref message))
                if message == "Your username or password was incorrect."
        );
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn authenticated_calls_carry_bearer_token() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server).await;
        let mut client = rest_client(&mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/rest/v11_4/Leads/l-1"))
            .and(bearer_token("access-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "l-1", "name": "Lead"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        client.get_token("admin", &password()).await.unwrap();
        let outcome = client.get_record("Leads", "l-1").await;

        assert_eq!(
            assert_ok!(outcome),
            Payload::Json(json!({"id": "l-1", "name": "Lead"}))
        );
    }

    #[tokio::test]
    async fn calls_without_token_fail_before_any_request() {
        let mock_server = MockServer::start().await;
        let client = rest_client(&mock_server.uri());

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        assert_matches!(client.me().await, Err(ClientError::MissingToken));
        assert_matches!(
            client.call(Method::GET, "Leads", None).await,
            Err(ClientError::MissingToken)
        );
    }

    #[tokio::test]
    async fn refresh_token_uses_stored_refresh_token() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server).await;
        let mut client = rest_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/rest/v11_4/oauth2/token"))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "refresh_token": "refresh-2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        client.get_token("admin", &password()).await.unwrap();
        let token = assert_ok!(client.refresh_token().await);

        assert_eq!(token.access_token.expose_secret(), "access-2");
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails() {
        let mut client = rest_client("https://crm.example.com");
        client.set_token(SecretString::from("external".to_string()));

        assert_matches!(client.refresh_token().await, Err(ClientError::MissingToken));
    }

    #[tokio::test]
    async fn unauthorized_response_is_an_authentication_error() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());
        client.set_token(SecretString::from("expired".to_string()));

        Mock::given(any())
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert_matches!(client.me().await, Err(ClientError::Authentication(_)));
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_body() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());
        client.set_token(SecretString::from(Faker.fake::<String>()));

        Mock::given(any())
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client.delete_record("Leads", "l-1").await;

        assert_matches!(
            outcome,
            Err(ClientError::ServerResponse { status_code, ref message })
                if status_code.as_u16() == 500 && message == "boom"
        );
    }

    #[tokio::test]
    async fn error_envelope_is_interpreted() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());
        client.set_token(SecretString::from(Faker.fake::<String>()));

        Mock::given(method("POST"))
            .and(path("/rest/v11_4/Leads/filter"))
            .and(body_partial_json(json!({"max_num": 20})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Unknown",
                "description": "no idea",
                "number": 777
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client
            .filter_records("Leads", &json!({"filter": [{"status": "New"}], "max_num": 20}))
            .await;

        assert_matches!(outcome, Err(ClientError::UnknownError { .. }));
    }

    #[tokio::test]
    async fn logout_clears_tokens() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server).await;
        let mut client = rest_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/rest/v11_4/oauth2/logout"))
            .and(bearer_token("access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        client.get_token("admin", &password()).await.unwrap();
        assert_ok!(client.logout().await);

        assert!(!client.has_token());
        assert_matches!(client.refresh_token().await, Err(ClientError::MissingToken));
    }

    #[tokio::test]
    async fn create_and_update_send_json_fields() {
        let mock_server = MockServer::start().await;
        let mut client = rest_client(&mock_server.uri());
        client.set_token(SecretString::from("access-1".to_string()));

        Mock::given(method("POST"))
            .and(path("/rest/v11_4/Contacts"))
            .and(body_partial_json(json!({"first_name": "Ada"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/rest/v11_4/Contacts/c-1"))
            .and(body_partial_json(json!({"last_name": "Lovelace"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let created = json!({"first_name": "Ada"});
        let updated = json!({"last_name": "Lovelace"});

        assert_ok!(
            client
                .create_record("Contacts", created.as_object().unwrap())
                .await
        );
        assert_ok!(
            client
                .update_record("Contacts", "c-1", updated.as_object().unwrap())
                .await
        );
    }
}
