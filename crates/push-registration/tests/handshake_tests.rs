//! End-to-end handshake against a mock backend.

use push_registration::*;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_config() -> ServiceConfig {
    ServiceConfig {
        bundle_id: "com.example.app".into(),
        project_id: "demo-project".into(),
        api_key: SecretString::new("test-api-key".into()),
        app_id: "1:123:ios:abc".into(),
        sender_id: "123".into(),
    }
}

fn system_info() -> SystemInfo {
    SystemInfo {
        os_version: "17.2".into(),
        app_version: "2.0".into(),
        device_model: "iPhone".into(),
        locale: "en".into(),
        time_zone: "Europe/Kiev".into(),
    }
}

fn spawn_client(mock_server: &MockServer, state: HandshakeState) -> RegistrationClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let controller =
        RegistrationController::new(service_config(), Environment::Sandbox, Arc::new(transport))
            .with_system_info(system_info())
            .with_endpoints(Endpoints::with_base_url(mock_server.uri()))
            .with_state(state);
    RegistrationClient::spawn(controller)
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

async fn mount_checkin(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/checkin"))
        .and(body_string_contains("\"os_version\":\"IOS_17.2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "android_id": 4242u64,
            "security_token": 99u64,
            "version_info": "v1",
            "digest": "dg",
            "time_msec": now_ms(),
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn wait_for_push_token(events: &mut broadcast::Receiver<RegistrationEvent>) -> (String, Vec<u8>) {
    loop {
        match timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Ok(RegistrationEvent::PushTokenUpdated {
                push_token,
                platform_token,
            })) => return (push_token, platform_token),
            Ok(Ok(_)) => continue,
            other => panic!("handshake did not finish: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_full_handshake() {
    let mock_server = MockServer::start().await;
    mount_checkin(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/demo-project/installations/"))
        .and(header("X-Goog-Api-Key", "test-api-key"))
        .and(header("X-Ios-Bundle-Identifier", "com.example.app"))
        .and(body_string_contains("\"authVersion\":\"FIS_v2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fid": "fid-1",
            "refreshToken": "refresh-1",
            "authToken": {"token": "auth-1", "expiresIn": "604800s"},
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .and(header("Authorization", "AidLogin 4242:99"))
        .and(header("x-goog-firebase-installations-auth", "auth-1"))
        .and(header("info", "v1"))
        .and(body_string_contains("apns_token=s_deadbeef"))
        .and(body_string_contains("appid=fid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("token=push-abc\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = spawn_client(&mock_server, HandshakeState::default());
    let mut events = client.subscribe();

    client.register(vec![0xde, 0xad, 0xbe, 0xef]).unwrap();

    let (push_token, platform_token) = wait_for_push_token(&mut events).await;
    assert_eq!(push_token, "push-abc");
    assert_eq!(platform_token, vec![0xde, 0xad, 0xbe, 0xef]);

    let state = client.snapshot().await.unwrap();
    assert_eq!(state.push_token.as_deref(), Some("push-abc"));
    assert_eq!(
        state.installation.unwrap().auth_token.as_deref(),
        Some("auth-1")
    );
}

#[tokio::test]
async fn test_restored_state_skips_to_registration() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200).set_body_string("token=restored"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = HandshakeState {
        checkin: Some(CheckinRecord {
            device_id: 1,
            secret_token: 2,
            version: "v1".into(),
            digest: String::new(),
            timestamp: Some(now_ms()),
        }),
        installation: Some(InstallationRecord {
            app_instance_id: "fid-1".into(),
            refresh_token: "refresh-1".into(),
            auth_token: Some("auth-1".into()),
        }),
        push_token: None,
    };
    let client = spawn_client(&mock_server, state);
    let mut events = client.subscribe();

    client.register(vec![0x01]).unwrap();

    let (push_token, _) = wait_for_push_token(&mut events).await;
    assert_eq!(push_token, "restored");
}

#[tokio::test]
async fn test_checkin_rejected_by_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkin"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = spawn_client(&mock_server, HandshakeState::default());
    let mut events = client.subscribe();

    client.register(vec![0x01]).unwrap();

    // failures are silent and never retried
    let result = timeout(Duration::from_millis(500), events.recv()).await;
    assert!(result.is_err());

    let state = client.snapshot().await.unwrap();
    assert!(state.checkin.is_none());
    assert!(state.push_token.is_none());
}

#[tokio::test]
async fn test_registration_without_token_line_drops_auth_token() {
    let mock_server = MockServer::start().await;
    mount_checkin(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/demo-project/installations/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fid": "fid-1",
            "refreshToken": "refresh-1",
            "authToken": {"token": "auth-1"},
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Error=INVALID_PARAMETERS"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = spawn_client(&mock_server, HandshakeState::default());
    let mut events = client.subscribe();

    client.register(vec![0x01]).unwrap();

    assert!(matches!(
        timeout(Duration::from_secs(5), events.recv()).await,
        Ok(Ok(RegistrationEvent::CheckinUpdated(_)))
    ));
    assert!(matches!(
        timeout(Duration::from_secs(5), events.recv()).await,
        Ok(Ok(RegistrationEvent::InstallationUpdated(_)))
    ));

    let mut installation = None;
    for _ in 0..50 {
        let state = client.snapshot().await.unwrap();
        if state.installation.as_ref().is_some_and(|i| i.auth_token.is_none()) {
            installation = state.installation;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let installation = installation.expect("auth token was not cleared");
    assert_eq!(installation.app_instance_id, "fid-1");
    assert_eq!(installation.refresh_token, "refresh-1");
}
