use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    notify,
    utils::{
        ApiResponse, Claims, JsonBody, Lang, MessageResponse, generate_token, non_blank,
        success_to_api_response,
    },
};

use super::google::verify_google_token;
use super::model::{
    AuthResponse, GoogleLoginRequest, LoginRequest, MeResponse, RegisterRequest,
    RegisterResponse, User, UserIdentity, VerifyEmailRequest,
};

fn credentials(email: Option<String>, password: Option<String>) -> AppResult<(String, String)> {
    let email = non_blank(email.as_deref());
    let password = password.filter(|p| !p.is_empty());
    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(AppError::Validation("Email et mot de passe requis".into())),
    }
}

fn issue_token(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let (access_token, expires_at) =
        generate_token(user.id, &user.email, user.is_admin, &state.config)?;

    Ok(AuthResponse {
        access_token,
        expires_at,
        user: user.identity(),
    })
}

/// 注册新用户
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisterResponse>>)> {
    let (email, password) = credentials(req.email, req.password)?;
    let lang = Lang::from_param(req.lang.as_deref());
    let full_name = non_blank(req.full_name.as_deref());

    let (user, token) = User::register(&state.pool, &email, &password, full_name.as_deref()).await?;

    if !notify::send_verification_email(&state, &user.email, &token, lang).await {
        tracing::warn!("Verification email for user {} was not delivered", user.id);
    }

    Ok((
        StatusCode::CREATED,
        success_to_api_response(RegisterResponse {
            message: "Inscription réussie. Vérifiez votre email.".into(),
            user_id: user.id,
        }),
    ))
}

#[axum::debug_handler]
pub async fn verify_email(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyEmailRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let token = non_blank(req.token.as_deref())
        .ok_or_else(|| AppError::Validation("Token manquant".into()))?;

    if !User::verify_email(&state.pool, &token).await? {
        return Err(AppError::Validation("Lien invalide ou expiré".into()));
    }

    Ok(success_to_api_response(MessageResponse::new("Email vérifié")))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let (email, password) = credentials(req.email, req.password)?;
    let user = User::authenticate(&state.pool, &email, &password).await?;

    tracing::info!("User {} logged in", user.id);
    Ok(success_to_api_response(issue_token(&state, &user)?))
}

#[axum::debug_handler]
pub async fn google_login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GoogleLoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let credential = non_blank(req.credential.as_deref())
        .or_else(|| non_blank(req.id_token.as_deref()))
        .ok_or_else(|| AppError::Validation("Token Google manquant".into()))?;

    let profile = verify_google_token(&state.http, &state.config.google_client_id, &credential)
        .await
        .ok_or_else(|| AppError::Unauthorized("Token Google invalide".into()))?;

    let user = User::find_or_create_google(&state.pool, &profile.email, &profile.name).await?;

    tracing::info!("User {} logged in with Google", user.id);
    Ok(success_to_api_response(issue_token(&state, &user)?))
}

/// 返回当前令牌中的身份
#[axum::debug_handler]
pub async fn me(Extension(claims): Extension<Claims>) -> AppResult<Json<ApiResponse<MeResponse>>> {
    Ok(success_to_api_response(MeResponse {
        user: UserIdentity {
            id: claims.user_id()?,
            email: claims.email,
            is_admin: claims.is_admin,
        },
    }))
}
