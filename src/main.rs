use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use pow_ledger::api::{self, AppState};
use pow_ledger::config::Config;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env().map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = AppState::from_config(&config).map_err(|e| std::io::Error::other(e.to_string()))?;
    {
        let ledger = state.ledger.lock().expect("mutex poisoned");
        info!(
            "height={} difficulty={} reward={} strategy={:?} validation={:?} reward_key={}",
            ledger.len(),
            ledger.difficulty,
            ledger.reward,
            config.nonce_strategy,
            ledger.validation,
            state.wallet.public_key_hex()
        );
    }

    println!(
        "⛓️ Starting ledger node at http://{}:{}",
        config.host, config.port
    );

    let state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
