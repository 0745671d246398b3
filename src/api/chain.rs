use actix_web::{HttpResponse, get, post, web};
use log::info;

use super::models::{
    AppState, DifficultyResponse, MineRequest, MineResponse, SetDifficultyRequest,
    ValidateResponse,
};
use crate::blockchain::DIFF_MAX;
use crate::blockchain::codec::{BlockJson, LedgerJson};
use crate::error::LedgerError;

/// Get the full serialized ledger. Peers fetch this during consensus.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> HttpResponse {
    let ledger = state.ledger.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(LedgerJson::from(&*ledger))
}

/// Validate the whole local chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> HttpResponse {
    let ledger = state.ledger.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(ValidateResponse {
        valid: ledger.is_valid_chain(&ledger.chain),
        length: ledger.len(),
        difficulty: ledger.difficulty,
    })
}

/// Mine a block from the current mempool. The proof search runs on the
/// blocking pool; the ledger is only locked to snapshot and to append.
#[post("/mine/")]
pub async fn mine_block(
    state: web::Data<AppState>,
    body: Option<web::Json<MineRequest>>,
) -> Result<HttpResponse, LedgerError> {
    let note = body.and_then(|b| b.into_inner().note).unwrap_or_default();
    let node = state.node.clone();

    let block = web::block(move || node.mine(&note))
        .await
        .map_err(|e| LedgerError::Io(std::io::Error::other(e.to_string())))??;
    super::persist(&state).await;

    let hash = block.hash();
    info!("POST /mine/ - block {} appended", hash);
    Ok(HttpResponse::Created().json(MineResponse {
        message: "New Block Mined!".to_string(),
        hash,
        block: BlockJson::from(&block),
    }))
}

/// Get current PoW difficulty.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> HttpResponse {
    let ledger = state.ledger.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: ledger.difficulty,
    })
}

/// Update PoW difficulty (affects future appends and validation).
#[post("/difficulty/")]
pub async fn set_difficulty(
    state: web::Data<AppState>,
    body: web::Json<SetDifficultyRequest>,
) -> HttpResponse {
    if body.difficulty > DIFF_MAX {
        return HttpResponse::BadRequest().body(format!("difficulty too high (max {DIFF_MAX})"));
    }
    let difficulty = {
        let mut ledger = state.ledger.lock().expect("mutex poisoned");
        ledger.set_difficulty(body.difficulty);
        ledger.difficulty
    };
    super::persist(&state).await;
    HttpResponse::Ok().json(DifficultyResponse { difficulty })
}
