#![allow(dead_code)]

use chrono_tz::Tz;
use shareboard::{
    AppConfig, AppState, FixedClock, InMemoryRepository, MockStorageService,
    clock::ClockState,
    identity::{Identity, Role, RoleSet, not_banned},
    models::{CreatePublicationRequest, NewImage, PublicationView, User},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use std::sync::Arc;
use uuid::Uuid;

/// Everything a service-level test needs: the shared state plus typed handles
/// on the in-memory repository and the mock bucket for assertions.
pub struct TestEnv {
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
}

/// State pinned to 2025-01-15 12:00 UTC.
pub fn test_env() -> TestEnv {
    test_env_at(FixedClock::at(Tz::UTC, 2025, 1, 15, 12, 0).unwrap())
}

pub fn test_env_at(clock: FixedClock) -> TestEnv {
    let repo = Arc::new(InMemoryRepository::new());
    let storage = MockStorageService::new();
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(storage.clone()) as StorageState,
        clock: Arc::new(clock) as ClockState,
        config: AppConfig::default(),
    };
    TestEnv {
        state,
        repo,
        storage,
    }
}

/// Inserts a user directly, skipping password hashing. Such users cannot log in.
pub async fn seed_user(env: &TestEnv, username: &str, roles: &[Role]) -> Identity {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        roles: RoleSet::new(roles.iter().copied()),
        password_hash: "not-a-real-hash".to_string(),
        banned_until: not_banned(),
    };
    let created = env
        .repo
        .insert_user(user)
        .await
        .expect("seed user");
    Identity::from(&created)
}

pub async fn seed_publication(env: &TestEnv, owner: &Identity, image_keys: &[&str]) -> PublicationView {
    let req = CreatePublicationRequest {
        description: format!("post by {}", owner.username),
        images: image_keys
            .iter()
            .map(|key| NewImage {
                key: key.to_string(),
                description: String::new(),
            })
            .collect(),
    };
    shareboard::content::create_publication(&env.state, owner, req)
        .await
        .expect("seed publication")
}

/// Re-reads a user's current snapshot.
pub async fn reload(env: &TestEnv, id: Uuid) -> Identity {
    let user = env
        .repo
        .find_user(id)
        .await
        .expect("repo")
        .expect("user exists");
    Identity::from(&user)
}
