use crate::domain::ports::AccountApiRef;
use crate::domain::user::{
    Credentials, PasswordChange, PasswordResetConfirm, Registration, User,
};
use crate::error::{EnrollError, Result};
use crate::infrastructure::session::Session;
use tracing::{info, warn};

const PASSWORD_MISMATCH: &str = "As senhas não coincidem";

/// Registration, login and the rest of the account screens, keeping the
/// [`Session`] in step with the backend.
pub struct AccountService {
    api: AccountApiRef,
    session: Session,
}

impl AccountService {
    pub fn new(api: AccountApiRef, session: Session) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn register(&self, registration: &Registration) -> Result<User> {
        if registration.password != registration.password2 {
            return Err(EnrollError::Validation(PASSWORD_MISMATCH.into()));
        }
        let auth = self.api.register(registration).await?;
        self.session.begin(&auth).await?;
        info!(user = %auth.user.email, "account registered");
        Ok(auth.user)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let auth = self.api.login(credentials).await?;
        self.session.begin(&auth).await?;
        Ok(auth.user)
    }

    /// Ends the local session even when the backend call fails.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "logout request failed, clearing local session anyway");
        }
        self.session.end().await
    }

    pub async fn profile(&self) -> Result<User> {
        if !self.session.is_authenticated().await {
            return Err(EnrollError::NotAuthenticated);
        }
        let user = self.api.profile().await?;
        self.session.update_user(user.clone()).await?;
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        if change.new_password != change.new_password2 {
            return Err(EnrollError::Validation(PASSWORD_MISMATCH.into()));
        }
        self.api.change_password(change).await?;
        info!("password changed");
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EnrollError::Validation("Informe seu email".into()));
        }
        self.api.request_password_reset(email).await
    }

    pub async fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<()> {
        self.api.confirm_password_reset(confirm).await
    }
}
