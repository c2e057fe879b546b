use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{AuthMiddleware, AuthenticatedUser},
    errors::AppError,
    models::dto::{request::SaveAnswerRequest, response::SaveAnswerResponse},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/attempts")
            .wrap(AuthMiddleware)
            // `/mine` must be registered before `/{attempt_id}`.
            .service(list_my_attempts)
            .service(start_attempt)
            .service(save_answer)
            .service(submit_attempt)
            .service(get_attempt_detail),
    );
}

#[post("/{quiz_id}/start")]
async fn start_attempt(
    state: web::Data<AppState>,
    quiz_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let opened = state
        .quiz_attempt_service
        .open_attempt(&quiz_id, &auth.0)
        .await?;

    if opened.reused {
        Ok(HttpResponse::Ok().json(opened))
    } else {
        Ok(HttpResponse::Created().json(opened))
    }
}

#[post("/{attempt_id}/answer")]
async fn save_answer(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    request: web::Json<SaveAnswerRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    request.validate()?;

    let (question_id, answer) = request.into_parts();
    state
        .quiz_attempt_service
        .save_answer(&attempt_id, &auth.0, &question_id, answer)
        .await?;

    Ok(HttpResponse::Ok().json(SaveAnswerResponse { ok: true }))
}

#[post("/{attempt_id}/submit")]
async fn submit_attempt(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let submitted = state
        .quiz_attempt_service
        .submit_attempt(&attempt_id, &auth.0)
        .await?;
    Ok(HttpResponse::Ok().json(submitted))
}

#[get("/mine")]
async fn list_my_attempts(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let attempts = state.quiz_attempt_service.list_my_attempts(&auth.0).await?;
    Ok(HttpResponse::Ok().json(attempts))
}

#[get("/{attempt_id}")]
async fn get_attempt_detail(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let view = state
        .attempt_detail_service
        .get_attempt_detail(&attempt_id, &auth.0)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}
