#![allow(dead_code)]

use chrono::Utc;
use shovel_api::app::{AppState, build_router};
use shovel_api::model::User;
use shovel_api::store::ReliefStore;
use shovel_api::store::memory::InMemoryStore;
use shovel_authz::{Role, TokenIssuer, TokenVerifier, UserStatus};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const ISSUER: &str = "shovel-heroes";
pub const SECRET: &[u8] = b"integration-secret";

pub type TestService = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub struct TestApp {
    pub app: TestService,
    pub store: Arc<InMemoryStore>,
    issuer: TokenIssuer,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state_store: Arc<dyn ReliefStore + Send + Sync> = store.clone();
        let state = AppState {
            api_version: "v1".to_string(),
            store: state_store,
            verifier: Arc::new(TokenVerifier::new(ISSUER, SECRET, 5)),
            list_limit: 50,
        };
        Self {
            app: build_router(state).into_service(),
            store,
            issuer: TokenIssuer::new(ISSUER, SECRET, Duration::from_secs(900)),
        }
    }

    /// Insert an active user and return it with a bearer token.
    pub async fn user(&self, name: &str, role: Role) -> (User, String) {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: Some(format!("{}@example.org", name.to_lowercase())),
            phone: None,
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        let user = self.store.create_user(user).await.expect("create user");
        let token = self.issuer.mint(user.id).expect("mint token");
        (user, token)
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.issuer.mint(user_id).expect("mint token")
    }
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
