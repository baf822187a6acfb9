use exactmatch_auth::{Principal, Role};
use exactmatch_core::UserId;
use exactmatch_infra::UserRecord;

/// Authenticated requester: profile from the user directory plus resolved
/// roles and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user: UserRecord,
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(user: UserRecord, principal: Principal) -> Self {
        Self { user, principal }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }
}
