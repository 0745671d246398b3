mod balance;
mod chain;
mod health;
pub mod models;
mod nodes;
mod tx;
mod wallet;

use actix_web::http::StatusCode;
use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpResponse, ResponseError};
use log::warn;

use crate::error::LedgerError;
pub use models::AppState;
use models::ErrorResponse;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(chain::get_difficulty)
            .service(chain::set_difficulty)
            .service(tx::post_transaction)
            .service(tx::get_mempool)
            .service(balance::get_balance)
            .service(nodes::register_nodes)
            .service(nodes::list_nodes)
            .service(nodes::consensus)
            .service(wallet::create_wallet)
            .service(wallet::wallet_summary),
    );
}

/// Save the ledger on the blocking pool so file IO stays off the worker.
async fn persist(state: &web::Data<AppState>) {
    let state = state.clone();
    if let Err(e) = web::block(move || state.persist()).await {
        warn!("persistence task failed: {e}");
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::RejectedBlock { .. }
            | LedgerError::StaleTip { .. }
            | LedgerError::Cancelled => StatusCode::CONFLICT,
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Decode(_) => StatusCode::BAD_REQUEST,
            LedgerError::Transport(_) => StatusCode::BAD_GATEWAY,
            LedgerError::Configuration(_) | LedgerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
