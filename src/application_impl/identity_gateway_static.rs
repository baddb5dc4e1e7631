use crate::application_port::AuthError;
use crate::domain_model::Principal;
use crate::domain_port::IdentityGateway;
use dashmap::DashMap;

/// Fixed-roster identity collaborator for demos and tests. Real deployments
/// plug their own `IdentityGateway` in; credential hashing is that side's
/// concern.
#[derive(Default)]
pub struct StaticIdentityGateway {
    users: DashMap<String, (String, Principal)>,
}

impl StaticIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, password: impl Into<String>, principal: Principal) -> Self {
        self.users
            .insert(principal.username.clone(), (password.into(), principal));
        self
    }
}

#[async_trait::async_trait]
impl IdentityGateway for StaticIdentityGateway {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        match self.users.get(username) {
            Some(entry) if entry.0 == password => Ok(entry.1.clone()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}
