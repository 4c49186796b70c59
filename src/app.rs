use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/session", get(handlers::get_session))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/federated", post(handlers::federated_login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/reset", post(handlers::reset_password))
        .route("/api/cards", get(handlers::list_cards).post(handlers::add_card))
        .route("/api/cards/:id", delete(handlers::delete_card))
        .route("/api/cards/:id/edit", post(handlers::start_edit))
        .route("/api/cards/:id/draft", patch(handlers::update_draft))
        .route("/api/cards/:id/cancel", post(handlers::cancel_edit))
        .route("/api/cards/:id/save", post(handlers::save_card))
        .route("/api/cards/:id/complete", post(handlers::complete_card))
        .route("/api/cards/:id/restart", post(handlers::restart_card))
        .route("/api/cards/:id/drag", post(handlers::drag_card))
        .route("/api/stats", get(handlers::get_stats))
        .route(
            "/api/preferences",
            get(handlers::get_preferences).put(handlers::put_preferences),
        )
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::put_profile),
        )
        .route("/api/goals", get(handlers::list_goals).post(handlers::add_goal))
        .route("/api/goals/:id/progress", patch(handlers::update_goal_progress))
        .route("/api/analytics", post(handlers::track_action))
        .route("/api/export", get(handlers::export_data))
        .route("/api/backup", post(handlers::backup_data))
        .route("/api/account", delete(handlers::delete_account))
        .with_state(state)
}
