use crate::application_port::AuthError;
use crate::domain_model::Principal;

/// External identity-lookup collaborator. Credential storage and hashing
/// live behind this boundary; the auth service only sees the resolved
/// principal or `InvalidCredentials`.
#[async_trait::async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, AuthError>;
}
