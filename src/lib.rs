pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::admin_service::AdminService;
use application::cart_service::CartService;
use application::catalog_service::CatalogService;
use application::identity::{IdentityService, SessionManager, SessionTimeouts};
use application::order_service::OrderService;
use application::wishlist_service::WishlistService;
use config::Config;
use domain::errors::DomainError;
use domain::ports::Repositories;
use handlers::ApiDoc;
use infrastructure::auth_client::AuthClient;
use infrastructure::image_store::ImageStore;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Upper bound for raw image uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const CATALOG_RETRY_DELAY: Duration = Duration::from_millis(500);
const PROFILE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), DomainError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DomainError::Internal(format!("migrations failed: {e}")))?;
    Ok(())
}

/// Services shared by every worker.
pub struct AppState {
    pub catalog: CatalogService,
    pub cart: CartService,
    pub orders: OrderService,
    pub wishlist: WishlistService,
    pub admin: AdminService,
    pub sessions: SessionManager,
    pub images: ImageStore,
}

impl AppState {
    pub fn new(repos: Repositories, config: &Config) -> Result<Self, DomainError> {
        let auth = AuthClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            config.auth_timeout,
        )?;
        let identity = Arc::new(IdentityService::new(repos.profiles.clone()));
        let images = ImageStore::new(&config.library_dir, &config.backend_base_url);

        Ok(Self {
            catalog: CatalogService::new(repos.products.clone(), CATALOG_RETRY_DELAY),
            cart: CartService::new(&repos),
            orders: OrderService::new(&repos, config.order_expiry),
            wishlist: WishlistService::new(&repos),
            admin: AdminService::new(&repos, images.clone()),
            sessions: SessionManager::new(
                auth,
                identity,
                SessionTimeouts {
                    login: config.auth_timeout,
                    profile: config.profile_timeout,
                    profile_retry_delay: PROFILE_RETRY_DELAY,
                },
            ),
            images,
        })
    }
}

/// Registers every route and the Swagger UI.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use handlers::{admin, auth, cart, library, orders, products, profile, wishlist};

    cfg.route("/", web::get().to(products::health))
        .service(
            web::scope("/products")
                .route("", web::get().to(products::list_products))
                .route("/{id}", web::get().to(products::get_product)),
        )
        .service(
            web::scope("/cart")
                .route("", web::get().to(cart::get_cart))
                .route("/items", web::post().to(cart::add_item))
                .route("/items/{id}", web::patch().to(cart::update_item))
                .route("/items/{id}", web::delete().to(cart::remove_item)),
        )
        .service(
            web::scope("/orders")
                .route("", web::post().to(orders::place_order))
                .route("", web::get().to(orders::list_orders))
                .route("/expire", web::post().to(orders::expire_orders))
                .route("/{id}", web::get().to(orders::get_order))
                .route("/{id}/cancel", web::post().to(orders::cancel_order)),
        )
        .service(
            web::scope("/wishlist")
                .route("", web::get().to(wishlist::list_wishlist))
                .route("", web::post().to(wishlist::add_to_wishlist))
                .route("/{id}", web::delete().to(wishlist::remove_from_wishlist))
                .route("/{id}/to-cart", web::post().to(wishlist::move_to_cart)),
        )
        .service(
            web::scope("/profile")
                .route("", web::get().to(profile::get_profile))
                .route("/username", web::put().to(profile::update_username)),
        )
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/crew-login", web::post().to(auth::crew_login))
                .route("/refresh", web::post().to(auth::refresh))
                .route("/password-reset", web::post().to(auth::password_reset))
                .route("/logout", web::post().to(auth::logout)),
        )
        .service(
            web::scope("/admin")
                .route("/products", web::get().to(admin::list_products))
                .route("/products", web::post().to(admin::create_product))
                .route("/products/name-exists", web::get().to(admin::name_exists))
                .route("/orders", web::get().to(admin::list_orders))
                .route("/orders/{id}/status", web::patch().to(admin::set_order_status))
                .route(
                    "/orders/{id}/restore-stock",
                    web::post().to(admin::restore_stock),
                ),
        )
        .route("/update-product/{id}", web::put().to(admin::update_product))
        .route("/delete-product/{id}", web::delete().to(admin::delete_product))
        .route("/upload-image", web::post().to(admin::upload_image))
        .route("/delete-image/{filename}", web::delete().to(admin::delete_image))
        .route(
            "/library/items/{filename}",
            web::get().to(library::serve_item_image),
        )
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: web::Data<AppState>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind((host.to_string(), port))?
    .run())
}
