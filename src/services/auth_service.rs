use crate::auth::{hash_password, verify_password, JwtKeys};
use crate::bidding::BiddingRules;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProviderProfile, ProviderProfileInput, User, UserRole};
use crate::repositories::Repositories;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub role: UserRole,
    /// Required for providers
    #[serde(default)]
    pub profile: Option<ProviderProfileInput>,
}

impl RegisterRequest {
    fn validate(&self) -> AppResult<()> {
        let email = self.email.trim();
        if email.len() < 3 || !email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if self.password.chars().count() < 8 {
            return Err(AppError::Validation("Password must be at least 8 characters".to_string()));
        }
        if self.full_name.trim().is_empty() {
            return Err(AppError::Validation("Full name is required".to_string()));
        }
        match (self.role, &self.profile) {
            (UserRole::Admin, _) => Err(AppError::Forbidden("Admin accounts cannot self-register".to_string())),
            (UserRole::Provider, None) => Err(AppError::Validation("Providers must include a profile".to_string())),
            (UserRole::Provider, Some(profile)) => profile.validate().map_err(AppError::Validation),
            (UserRole::Customer, _) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProviderProfile>,
}

/// Account registration and login
pub struct AuthService {
    repos: Repositories,
    jwt: JwtKeys,
    signup_bonus: i64,
}

impl AuthService {
    pub fn new(repos: Repositories, jwt: JwtKeys, rules: &BiddingRules) -> Self {
        Self {
            repos,
            jwt,
            signup_bonus: rules.signup_bonus,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        let user = self
            .repos
            .users
            .create_user(NewUser {
                email: request.email.trim().to_lowercase(),
                phone: request.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
                full_name: request.full_name.trim().to_string(),
                role: request.role,
                city: request.city,
                password_hash: hash_password(&request.password)?,
            })
            .await?;

        let profile = match (&request.profile, user.role_enum()) {
            (Some(input), UserRole::Provider) => Some(
                self.repos
                    .providers
                    .upsert_profile(user.id, input, self.signup_bonus)
                    .await?,
            ),
            _ => None,
        };

        info!("Registered {} account {}", user.role, user.id);

        Ok(AuthResponse {
            token: self.jwt.issue(user.id, user.role_enum())?,
            user,
            profile,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .repos
            .users
            .find_by_email(request.email.trim())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

        verify_password(&request.password, &user.password_hash)?;

        let profile = if user.is_provider() {
            self.repos.providers.find_profile(user.id).await?
        } else {
            None
        };

        Ok(AuthResponse {
            token: self.jwt.issue(user.id, user.role_enum())?,
            user,
            profile,
        })
    }

    /// Current user with the provider profile when there is one
    pub async fn me(&self, user_id: Uuid) -> AppResult<(User, Option<ProviderProfile>)> {
        let user = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let profile = self.repos.providers.find_profile(user_id).await?;
        Ok((user, profile))
    }
}
