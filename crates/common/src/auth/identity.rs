//! User directory: registration, login and profile lookup

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{hash_password, verify_password, JwtManager};
use crate::db::models::User;
use crate::db::store::{NewUser, WorkflowStore};
use crate::errors::{AppError, Result};
use crate::workflow::{Actor, Operation, Role};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Staff account created by an admin
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn WorkflowStore>,
    jwt: Arc<JwtManager>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IdentityService {
    pub fn new(store: Arc<dyn WorkflowStore>, jwt: Arc<JwtManager>) -> Self {
        Self { store, jwt }
    }

    /// Self-registration; the account is always an author
    pub async fn register(&self, mut input: RegisterRequest) -> Result<User> {
        input.email = normalize_email(&input.email);
        input.name = input.name.trim().to_string();
        input.validate()?;

        let user = self
            .insert(input.email, &input.password, input.name, Role::Author)
            .await?;

        info!(user_id = %user.id, role = %Role::Author, "User registered");
        Ok(user)
    }

    /// Create an editor or coordinator account
    pub async fn create_user(&self, actor: Actor, mut input: CreateUserRequest) -> Result<User> {
        actor.authorize(Operation::CreateUser)?;

        input.email = normalize_email(&input.email);
        input.name = input.name.trim().to_string();
        input.validate()?;
        if !matches!(input.role, Role::Editor | Role::Coordinator) {
            return Err(AppError::validation(
                "role",
                "only editor and coordinator accounts can be created",
            ));
        }

        let user = self
            .insert(input.email, &input.password, input.name, input.role)
            .await?;

        info!(
            user_id = %user.id,
            role = %input.role,
            created_by = %actor.user_id,
            "Staff account created"
        );
        Ok(user)
    }

    /// Make sure an admin with `email` exists. Returns the account when it
    /// had to be created.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        if password.len() < 6 {
            return Err(AppError::Configuration {
                message: "auth.admin_password must be at least 6 characters".to_string(),
            });
        }

        let user = self
            .insert(email, password, "Administrator".to_string(), Role::Admin)
            .await?;
        info!(user_id = %user.id, "Bootstrap admin created");
        Ok(Some(user))
    }

    async fn insert(&self, email: String, password: &str, name: String, role: Role) -> Result<User> {
        self.store
            .insert_user(NewUser {
                email,
                password_hash: hash_password(password)?,
                name,
                role,
            })
            .await
    }

    /// Verify credentials and issue a token. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, input: LoginRequest) -> Result<LoginResponse> {
        let user = self
            .store
            .find_user_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash) {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.jwt.generate_token(user.id, user.role()?)?;
        info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse { user, token })
    }

    pub async fn profile(&self, actor: Actor) -> Result<User> {
        actor.authorize(Operation::ViewProfile)?;
        self.find(actor.user_id).await
    }

    pub async fn find(&self, user_id: Uuid) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                id: user_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn service() -> IdentityService {
        IdentityService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(JwtManager::new("test_secret", 3600)),
        )
    }

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: "Abebe Kebede".to_string(),
        }
    }

    fn staff(email: &str, role: Role) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "secret1".to_string(),
            name: "Selam Tesfaye".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let identity = service();
        let user = identity.register(register("Abebe@SMU.edu ", "secret1")).await.unwrap();
        assert_eq!(user.email, "abebe@smu.edu");
        assert_ne!(user.password_hash, "secret1");

        let session = identity
            .login(LoginRequest {
                email: "abebe@smu.edu".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, user.id);

        let claims = identity.jwt.validate_token(&session.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Author);
    }

    #[tokio::test]
    async fn test_password_hash_is_not_serialized() {
        let identity = service();
        let user = identity.register(register("a@smu.edu", "secret1")).await.unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "author");
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let identity = service();
        identity.register(register("a@smu.edu", "secret1")).await.unwrap();

        for (email, password) in [("a@smu.edu", "wrong!!"), ("b@smu.edu", "secret1")] {
            let err = identity
                .login(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn test_register_validation_and_duplicates() {
        let identity = service();

        let err = identity.register(register("a@smu.edu", "12345")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = identity.register(register("not-an-email", "secret1")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        identity.register(register("a@smu.edu", "secret1")).await.unwrap();
        let err = identity.register(register("A@smu.edu", "secret2")).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_profile() {
        let identity = service();
        let user = identity.register(register("a@smu.edu", "secret1")).await.unwrap();

        let profile = identity.profile(Actor::new(user.id, Role::Author)).await.unwrap();
        assert_eq!(profile, user);

        let err = identity
            .profile(Actor::new(Uuid::new_v4(), Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_always_creates_an_author() {
        let identity = service();
        let body = r#"{"email":"x@smu.edu","password":"secret1","name":"X","role":"admin"}"#;
        let input: RegisterRequest = serde_json::from_str(body).unwrap();

        let user = identity.register(input).await.unwrap();
        assert_eq!(user.role().unwrap(), Role::Author);
    }

    #[tokio::test]
    async fn test_create_user_is_admin_only() {
        let identity = service();
        let admin = identity
            .bootstrap_admin("root@smu.edu", "secret1")
            .await
            .unwrap()
            .unwrap();
        let admin = Actor::new(admin.id, Role::Admin);

        let editor = identity
            .create_user(admin, staff(" Editor@SMU.edu", Role::Editor))
            .await
            .unwrap();
        assert_eq!(editor.email, "editor@smu.edu");
        assert_eq!(editor.role().unwrap(), Role::Editor);

        for role in [Role::Author, Role::Editor, Role::Coordinator] {
            let err = identity
                .create_user(Actor::new(Uuid::new_v4(), role), staff("c@smu.edu", Role::Coordinator))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InsufficientRole { .. }));
        }

        for role in [Role::Admin, Role::Author] {
            let err = identity
                .create_user(admin, staff("d@smu.edu", role))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn test_bootstrap_admin_runs_once() {
        let identity = service();
        assert!(identity.bootstrap_admin("Root@smu.edu", "secret1").await.unwrap().is_some());
        assert!(identity.bootstrap_admin("root@smu.edu", "other12").await.unwrap().is_none());

        let session = identity
            .login(LoginRequest {
                email: "root@smu.edu".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.role().unwrap(), Role::Admin);

        let err = service().bootstrap_admin("x@smu.edu", "123").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
