use actix_web::{HttpResponse, get, post, web};
use log::info;

use super::models::{
    AppState, ConsensusResponse, PeersResponse, RegisterNodesRequest, RegisterNodesResponse,
};
use crate::consensus::ReconcileOutcome;

/// Register peers whose chains are compared during consensus.
#[post("/nodes/register/")]
pub async fn register_nodes(
    state: web::Data<AppState>,
    body: web::Json<RegisterNodesRequest>,
) -> HttpResponse {
    let nodes = body.into_inner().nodes;
    if nodes.is_empty() {
        return HttpResponse::BadRequest().body("nodes required");
    }
    let added = state.consensus.register_peers(nodes.clone());
    super::persist(&state).await;
    info!("POST /nodes/register/ - {} new peers", added);

    HttpResponse::Created().json(RegisterNodesResponse {
        message: format!("Successfully added {} peers", nodes.len()),
        new_peers: nodes,
    })
}

#[get("/nodes/")]
pub async fn list_nodes(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(PeersResponse {
        peers: state.consensus.peers(),
    })
}

/// Reach consensus using the longest valid chain rule.
#[get("/consensus/")]
pub async fn consensus(state: web::Data<AppState>) -> HttpResponse {
    let response = match state.consensus.reconcile().await {
        ReconcileOutcome::Adopted => {
            super::persist(&state).await;
            ConsensusResponse {
                new_chain: true,
                message: "Longer valid chain found in a peer. Updated local chain.".to_string(),
            }
        }
        ReconcileOutcome::Unchanged => ConsensusResponse {
            new_chain: false,
            message: "Local chain was the longest valid chain among peers. No updates made."
                .to_string(),
        },
    };
    HttpResponse::Ok().json(response)
}
