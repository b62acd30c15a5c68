use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marketplace role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Provider,
    Admin,
}

impl UserRole {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(UserRole::Customer),
            "provider" => Ok(UserRole::Provider),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Provider => "provider",
            UserRole::Admin => "admin",
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

/// User account (customer, provider or admin)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub full_name: String,
    pub role: String, // Stored as TEXT, use UserRole enum for type safety
    pub city: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Get role as an enum
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or(UserRole::Customer)
    }

    pub fn is_provider(&self) -> bool {
        self.role_enum() == UserRole::Provider
    }

    pub fn is_customer(&self) -> bool {
        self.role_enum() == UserRole::Customer
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == UserRole::Admin
    }
}

/// Insert payload for a new account; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone: Option<String>,
    pub full_name: String,
    pub role: UserRole,
    pub city: Option<String>,
    pub password_hash: String,
}

impl NewUser {
    /// Materialize a row for adapters that do not generate ids themselves
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            phone: self.phone,
            full_name: self.full_name,
            role: self.role.as_str().to_string(),
            city: self.city,
            password_hash: self.password_hash,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
