use actix_web::web;
use dotenvy::dotenv;
use jaws_shop::config::Config;
use jaws_shop::infrastructure::diesel_repositories;
use jaws_shop::{build_server, create_pool, run_migrations, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(std::io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(std::io::Error::other)?;
    run_migrations(&pool).map_err(std::io::Error::other)?;

    let state = AppState::new(diesel_repositories(pool), &config).map_err(std::io::Error::other)?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(web::Data::new(state), &config.host, config.port)?.await
}
