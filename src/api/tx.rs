use std::time::Instant;

use actix_web::{HttpResponse, get, post, web};
use log::{debug, info};

use super::models::{AppState, MempoolResponse, NewTxRequest};
use crate::blockchain::codec::TransactionJson;
use crate::error::LedgerError;
use crate::wallet::public_key_from_hex;

/// Send from the node's wallet: signs the transfer and queues it in the mempool.
#[post("/transactions/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> Result<HttpResponse, LedgerError> {
    let t0 = Instant::now();
    if body.amount == 0 {
        return Ok(HttpResponse::BadRequest().body("amount must be > 0"));
    }
    let recipient = public_key_from_hex(&body.recipient)?;
    debug!(
        "POST /transactions/ - {} -> {} amount={}",
        state.wallet.public_key_hex(),
        body.recipient,
        body.amount
    );

    let tx = state.wallet.send(recipient, body.amount)?;
    super::persist(&state).await;

    info!(
        "POST /transactions/ - queued {} to {} ({} ms)",
        body.amount,
        body.recipient,
        t0.elapsed().as_millis()
    );
    Ok(HttpResponse::Created().json(TransactionJson::from(&tx)))
}

/// List the current mempool.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> HttpResponse {
    let ledger = state.ledger.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(MempoolResponse {
        size: ledger.mempool.len(),
        transactions: ledger.mempool.iter().map(TransactionJson::from).collect(),
    })
}
