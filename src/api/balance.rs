use actix_web::{HttpResponse, get, web};

use super::models::{AppState, BalanceResponse};
use crate::error::LedgerError;
use crate::wallet::{public_key_from_hex, public_key_to_hex};

#[get("/balance/{public_key}/")]
pub async fn get_balance(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
) -> Result<HttpResponse, LedgerError> {
    let key = public_key_from_hex(&path.into_inner().0)?;

    let ledger = state.ledger.lock().expect("mutex poisoned");
    let confirmed = ledger.confirmed_balance(&key);
    let pending = ledger.pending_balance(&key);

    Ok(HttpResponse::Ok().json(BalanceResponse {
        public_key: public_key_to_hex(&key),
        confirmed,
        pending,
        total: confirmed + pending,
    }))
}
