use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header;
use actix_web::web;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::ports::ProductRepository;
use crate::domain::product::{NewProduct, Product, ProductFields};
use crate::domain::user::{Profile, Role};
use crate::infrastructure::auth_client::fake::{self, Accounts};
use crate::infrastructure::memory::InMemoryStore;
use crate::AppState;

pub(crate) const CREW_EMAIL: &str = "crew@jaws.id";
pub(crate) const RIDER_EMAIL: &str = "rider@jaws.id";
pub(crate) const PASSWORD: &str = "secret-pass";

/// Application state over the in-memory store and a fake auth API that
/// knows one admin (`CREW_EMAIL`) and one shopper (`RIDER_EMAIL`).
pub(crate) struct TestApp {
    pub(crate) state: web::Data<AppState>,
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) accounts: Arc<Accounts>,
    pub(crate) rider_id: Uuid,
    pub(crate) library: PathBuf,
}

impl TestApp {
    /// Must be called inside a running actix/tokio runtime.
    pub(crate) fn start() -> Self {
        let store = InMemoryStore::new();
        let accounts = Arc::new(Accounts::default());

        let crew_id = accounts.add(CREW_EMAIL, PASSWORD);
        store.insert_profile(Profile {
            id: crew_id,
            email: CREW_EMAIL.to_string(),
            username: "crew".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        let rider_id = accounts.add(RIDER_EMAIL, PASSWORD);

        let library = std::env::temp_dir().join(format!("jaws-http-{}", Uuid::new_v4()));
        let config = Config {
            database_url: "postgres://unused".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            supabase_url: fake::spawn(accounts.clone()),
            supabase_anon_key: "anon-key".to_string(),
            backend_base_url: "http://localhost:8000".to_string(),
            library_dir: library.to_string_lossy().into_owned(),
            order_expiry: chrono::Duration::hours(24),
            auth_timeout: Duration::from_secs(5),
            profile_timeout: Duration::from_secs(5),
        };
        let state = AppState::new(store.repositories(), &config).expect("app state");

        Self {
            state: web::Data::new(state),
            store,
            accounts,
            rider_id,
            library,
        }
    }

    pub(crate) fn product(&self, name: &str, price: &str, stock: i32) -> Product {
        ProductRepository::create(
            self.store.as_ref(),
            NewProduct {
                fields: ProductFields {
                    name: name.to_string(),
                    price: BigDecimal::from_str(price).expect("valid decimal"),
                    description: String::new(),
                    stock,
                    vehicle_type: Some("Sport".to_string()),
                    item_type: Some("Brakes".to_string()),
                },
                image_url: None,
                created_by: None,
            },
        )
        .expect("seed product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.library);
    }
}

/// `Authorization` header for an account of the fake auth API.
pub(crate) fn bearer(email: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer token-{email}"))
}
