use actix_web::{HttpResponse, Responder, get, post, web};
use serde::Serialize;

use super::models::AppState;
use crate::wallet::generate_keypair_hex;

#[derive(Serialize)]
struct NewWalletResponse {
    private_key: String,
    public_key: String,
}

#[derive(Serialize)]
struct WalletSummaryResponse {
    public_key: String,
    label: String,
    confirmed: i128,
    pending: i128,
    total: i128,
    history: Vec<String>,
    accounts: Vec<String>,
}

#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let (sk, pk) = generate_keypair_hex();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: sk,
        public_key: pk,
    })
}

/// The node wallet's balances and its confirmed-then-pending history.
#[get("/wallet/")]
pub async fn wallet_summary(state: web::Data<AppState>) -> impl Responder {
    let wallet = &state.wallet;
    let history = wallet
        .describe(&wallet.all_transactions())
        .lines()
        .map(|line| line.trim().trim_start_matches("- ").to_string())
        .collect();
    let mut accounts: Vec<String> = state.node.accounts().map(|w| w.label()).collect();
    accounts.sort();

    HttpResponse::Ok().json(WalletSummaryResponse {
        public_key: wallet.public_key_hex(),
        label: wallet.label(),
        confirmed: wallet.confirmed_balance(),
        pending: wallet.pending_balance(),
        total: wallet.balance(),
        history,
        accounts,
    })
}
