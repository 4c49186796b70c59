use crate::errors::AppError;
use crate::identity::FederatedProfile;
use crate::models::{
    ActionRequest, CancelResponse, CardId, CardView, CardsResponse, CompletionResponse, Document,
    DragRequest, DragResponse, Draft, DraftPatch, ExportData, FederatedRequest,
    GoalProgressRequest, LoginRequest, Pointer, Preferences, RegisterRequest, RegisterResponse,
    ResetRequest, SessionUser, UserStats,
};
use crate::state::AppState;
use crate::stats::build_user_stats;
use crate::store::CancelOutcome;
use crate::ui::render_index;
use crate::validation::{password_strength, strength_label, validate_registration};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};
use serde_json::Value;
use tracing::warn;

const DASHBOARD_VIEW: &str = "dashboard_view";

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let user = state.session.current();
    let cards = state.tracker.views().await;
    Html(render_index(user.as_ref(), &cards))
}

pub async fn get_session(State(state): State<AppState>) -> Json<Option<SessionUser>> {
    Json(state.session.current())
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    validate_registration(&payload)?;
    state
        .identity
        .register(&payload.email, &payload.password, Some(payload.name.as_str()))
        .await?;
    let user = signed_in(&state).await?;
    let response = RegisterResponse {
        user,
        password_strength: strength_label(password_strength(&payload.password)),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionUser>, AppError> {
    state.identity.login(&payload.email, &payload.password).await?;
    Ok(Json(signed_in(&state).await?))
}

pub async fn federated_login(
    State(state): State<AppState>,
    Json(payload): Json<FederatedRequest>,
) -> Result<Json<SessionUser>, AppError> {
    let profile = FederatedProfile {
        provider: payload.provider,
        email: payload.email,
        display_name: payload.display_name,
        photo_url: payload.photo_url,
        cancelled: payload.cancelled,
    };
    state.identity.federated_login(profile).await?;
    Ok(Json(signed_in(&state).await?))
}

pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.identity.logout().await?;
    state.sync_auth().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<StatusCode, AppError> {
    state.identity.send_password_reset(&payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn signed_in(state: &AppState) -> Result<SessionUser, AppError> {
    state.sync_auth().await.ok_or_else(AppError::unauthorized)
}

pub async fn list_cards(State(state): State<AppState>) -> Json<CardsResponse> {
    Json(CardsResponse {
        user: state.session.current(),
        cards: state.tracker.views().await,
    })
}

pub async fn add_card(State(state): State<AppState>) -> Result<(StatusCode, Json<CardView>), AppError> {
    let id = state.tracker.add_card().await?;
    Ok((StatusCode::CREATED, Json(view(&state, &id).await?)))
}

pub async fn start_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Draft>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.tracker.start_edit(&id).await?))
}

pub async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<Draft>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.tracker.update_draft(&id, patch).await?))
}

pub async fn cancel_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let id = parse_id(&id)?;
    let outcome = state.tracker.cancel_edit(&id).await?;
    Ok(Json(CancelResponse {
        removed: outcome == CancelOutcome::Removed,
    }))
}

pub async fn save_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CardView>, AppError> {
    let id = parse_id(&id)?;
    let card = state.tracker.save_card(&id).await?;
    Ok(Json(view(&state, &card.id).await?))
}

pub async fn complete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompletionResponse>, AppError> {
    let id = parse_id(&id)?;
    let completion = state.tracker.record_completion(&id).await?;
    Ok(Json(CompletionResponse {
        card: view(&state, &completion.card.id).await?,
        celebrate: completion.celebrate,
    }))
}

pub async fn restart_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CardView>, AppError> {
    let id = parse_id(&id)?;
    let card = state.tracker.restart_card(&id).await?;
    Ok(Json(view(&state, &card.id).await?))
}

pub async fn drag_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DragRequest>,
) -> Result<Json<DragResponse>, AppError> {
    let id = parse_id(&id)?;
    let pointer = Pointer {
        x: payload.x,
        y: payload.y,
    };
    let (offset, committed) = state.tracker.drag(&id, payload.phase, pointer).await?;
    Ok(Json(DragResponse {
        offset: Some(offset),
        committed,
    }))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    state.tracker.delete_card(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<UserStats>, AppError> {
    match state.session.current() {
        Some(user) => {
            if let Err(err) = state
                .account
                .track_action(&user.id, DASHBOARD_VIEW, Document::new())
                .await
            {
                warn!("failed to record dashboard view: {err}");
            }
            Ok(Json(state.account.stats(&user.id).await?))
        }
        None => Ok(Json(build_user_stats(&state.tracker.cards().await))),
    }
}

pub async fn get_preferences(State(state): State<AppState>) -> Result<Json<Preferences>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.preferences(&user.id).await?))
}

pub async fn put_preferences(
    State(state): State<AppState>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<Preferences>, AppError> {
    let user = state.require_user()?;
    state.account.save_preferences(&user.id, &preferences).await?;
    Ok(Json(preferences))
}

pub async fn get_profile(State(state): State<AppState>) -> Result<Json<Document>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.profile(&user.id).await?))
}

pub async fn put_profile(
    State(state): State<AppState>,
    Json(fields): Json<Document>,
) -> Result<Json<Document>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.save_profile(&user.id, fields).await?))
}

pub async fn list_goals(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.goals(&user.id).await?))
}

pub async fn add_goal(
    State(state): State<AppState>,
    Json(goal): Json<Document>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let user = state.require_user()?;
    let goal = state.account.add_goal(&user.id, goal).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn update_goal_progress(
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
    Json(payload): Json<GoalProgressRequest>,
) -> Result<Json<Document>, AppError> {
    let user = state.require_user()?;
    state
        .account
        .update_goal_progress(&user.id, &goal_id, payload.progress)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("goal {goal_id} not found")))
}

pub async fn track_action(
    State(state): State<AppState>,
    Json(payload): Json<ActionRequest>,
) -> Result<StatusCode, AppError> {
    let user = state.require_user()?;
    if payload.action.trim().is_empty() {
        return Err(AppError::bad_request("action is required"));
    }
    state
        .account
        .track_action(&user.id, payload.action.trim(), payload.data)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_data(State(state): State<AppState>) -> Result<Json<ExportData>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.export(&user.id).await?))
}

pub async fn backup_data(State(state): State<AppState>) -> Result<Json<ExportData>, AppError> {
    let user = state.require_user()?;
    Ok(Json(state.account.backup(&user.id).await?))
}

pub async fn delete_account(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let user = state.require_user()?;
    state.account.delete_data(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(raw: &str) -> Result<CardId, AppError> {
    raw.parse::<CardId>()
        .map_err(|err| AppError::bad_request(err.to_string()))
}

async fn view(state: &AppState, id: &CardId) -> Result<CardView, AppError> {
    state
        .tracker
        .view(id)
        .await
        .ok_or_else(|| AppError::from(crate::errors::CardError::NotFound(id.clone())))
}
