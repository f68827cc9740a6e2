// Session lifecycle: obtains and holds the bearer token used by every
// authenticated request.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::http::{ApiClient, TokenHandle};
use crate::types::{ClientEvent, SessionState};

#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    api_key: String,
    state: Arc<RwLock<SessionState>>,
    token: TokenHandle,
    events: broadcast::Sender<ClientEvent>,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        api_key: impl Into<String>,
        token: TokenHandle,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            api_key: api_key.into(),
            state: Arc::new(RwLock::new(SessionState::None)),
            token,
            events,
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn is_created(&self) -> bool {
        self.state().await == SessionState::Created
    }

    async fn set_state(&self, new_state: SessionState) {
        let mut guard = self.state.write().await;
        if *guard == new_state {
            return;
        }
        *guard = new_state;
        drop(guard);
        let _ = self
            .events
            .send(ClientEvent::SessionStateChanged(new_state));
    }

    /// Requests a new session. A no-op unless the current state is `None` or
    /// `Failed`. Returns the resulting state; failures are reflected in the
    /// state rather than an error so callers can observe them uniformly
    /// through the event channel.
    pub async fn create_session(&self) -> SessionState {
        {
            let guard = self.state.read().await;
            if matches!(*guard, SessionState::Requesting | SessionState::Created) {
                return *guard;
            }
        }

        if self.api_key.is_empty() {
            warn!("Cannot create session without an API key");
            self.set_state(SessionState::Failed).await;
            return SessionState::Failed;
        }

        self.set_state(SessionState::Requesting).await;

        let path = format!("/v1/sessions/key/{}", self.api_key);
        let value = match self.api.get_json(&path).await {
            Ok(value) => value,
            Err(e) => {
                error!("Session request failed: {}", e);
                self.set_state(SessionState::Failed).await;
                return SessionState::Failed;
            }
        };

        let Some(token) = value.get("token").and_then(|t| t.as_str()) else {
            error!("Session response missing token field");
            self.set_state(SessionState::Failed).await;
            return SessionState::Failed;
        };

        {
            let mut guard = self.token.write().await;
            *guard = Some(token.to_string());
        }
        info!("Session created");
        self.set_state(SessionState::Created).await;
        SessionState::Created
    }

    /// Drops the token and forces the state back to `None`. Jobs and
    /// catalog caches are cleared by the facade before this runs.
    pub async fn clear(&self) {
        {
            let mut guard = self.token.write().await;
            *guard = None;
        }
        self.set_state(SessionState::None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(server_url: &str, api_key: &str) -> (SessionManager, broadcast::Receiver<ClientEvent>) {
        let token: TokenHandle = Arc::new(RwLock::new(None));
        let (events, rx) = broadcast::channel(64);
        let api = ApiClient::new(server_url.to_string(), token.clone());
        (SessionManager::new(api, api_key, token, events), rx)
    }

    #[tokio::test]
    async fn test_create_session_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/sessions/key/my_key")
            .with_status(200)
            .with_body(r#"{"token": "tok_1"}"#)
            .create_async()
            .await;

        let (manager, _rx) = manager(&server.url(), "my_key");
        assert_eq!(manager.create_session().await, SessionState::Created);
        assert_eq!(manager.state().await, SessionState::Created);
        assert_eq!(manager.token.read().await.as_deref(), Some("tok_1"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        // no mock registered; a request would error differently
        let (manager, _rx) = manager("http://127.0.0.1:1", "");
        assert_eq!(manager.create_session().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_missing_token_field_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/sessions/key/my_key")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let (manager, _rx) = manager(&server.url(), "my_key");
        assert_eq!(manager.create_session().await, SessionState::Failed);
        assert!(manager.token.read().await.is_none());
    }

    #[tokio::test]
    async fn test_create_session_idempotent_while_created() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/sessions/key/my_key")
            .with_status(200)
            .with_body(r#"{"token": "tok_1"}"#)
            .expect(1)
            .create_async()
            .await;

        let (manager, _rx) = manager(&server.url(), "my_key");
        assert_eq!(manager.create_session().await, SessionState::Created);
        assert_eq!(manager.create_session().await, SessionState::Created);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_clear_resets_state_and_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/sessions/key/my_key")
            .with_status(200)
            .with_body(r#"{"token": "tok_1"}"#)
            .create_async()
            .await;

        let (manager, mut rx) = manager(&server.url(), "my_key");
        manager.create_session().await;
        manager.clear().await;

        assert_eq!(manager.state().await, SessionState::None);
        assert!(manager.token.read().await.is_none());

        // requesting, created, none
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ClientEvent::SessionStateChanged(state) = event {
                seen.push(state);
            }
        }
        assert_eq!(
            seen,
            vec![
                SessionState::Requesting,
                SessionState::Created,
                SessionState::None
            ]
        );
    }
}
