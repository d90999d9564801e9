use axum::Router;
use std::sync::Arc;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AnalysisResult, AnalyzeRequest, AuthResponse, ChatRequest, ChatResponse, ContactInfo,
        PersonalInfo, SigninRequest, SignupRequest, UpdateAvatarRequest, UpdateProfileRequest,
        UploadResponse, UserResponse,
    },
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth endpoints
        crate::routes::auth::signup,
        crate::routes::auth::signin,
        // User endpoints
        crate::routes::users::get_profile,
        crate::routes::users::update_profile,
        crate::routes::users::update_avatar,
        // Document endpoints
        crate::routes::documents::upload_file,
        crate::routes::documents::analyze_report,
        // Chat endpoint
        crate::routes::chat::chat,
    ),
    components(
        schemas(
            SignupRequest, SigninRequest, AuthResponse, UserResponse,
            PersonalInfo, ContactInfo, UpdateProfileRequest, UpdateAvatarRequest,
            UploadResponse, AnalyzeRequest, AnalysisResult,
            ChatRequest, ChatResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Account signup and signin"),
        (name = "user", description = "Profile and avatar management"),
        (name = "documents", description = "Document upload and analysis"),
        (name = "chat", description = "Document-grounded medical chat"),
    ),
    info(
        title = "MedReport API",
        version = "0.1.0",
        description = "Medical document analysis, translation and chat API"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

pub fn create_swagger_router() -> Router<Arc<AppState>> {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
