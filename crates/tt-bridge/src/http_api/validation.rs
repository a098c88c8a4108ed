use axum::{extract::rejection::JsonRejection, Json};
use tracing::warn;

use tt_api_types::{
    MentionValidation, PathValidation, ScrollToLineRequest, ScrollToLineResponse,
    ValidateMentionsRequest, ValidatePathRequest,
};

use crate::validation;

/// POST /api/validate/path
pub(crate) async fn validate_path(
    body: Result<Json<ValidatePathRequest>, JsonRejection>,
) -> Json<PathValidation> {
    match body {
        Ok(Json(req)) => Json(validation::validate_path(&req.relative_path, &req.project_path).await),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "validate path body rejected");
            Json(PathValidation::default())
        }
    }
}

/// POST /api/validate/mentions
pub(crate) async fn validate_mentions(
    body: Result<Json<ValidateMentionsRequest>, JsonRejection>,
) -> Json<MentionValidation> {
    match body {
        Ok(Json(req)) => {
            Json(validation::validate_mentions(&req.mentions, &req.project_path).await)
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "validate mentions body rejected");
            Json(MentionValidation::new())
        }
    }
}

/// POST /api/session/scroll-to-line
pub(crate) async fn scroll_to_line(
    body: Result<Json<ScrollToLineRequest>, JsonRejection>,
) -> Json<ScrollToLineResponse> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Json(validation::scroll_to_line(&req.session_id, req.line_number))
}
