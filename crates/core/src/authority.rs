use crate::domain::principal::{Principal, Role};
use crate::domain::request::{RequestKind, UserId};

/// The one source of truth for adjudication privilege. Exact membership,
/// no hierarchy or inheritance.
pub const ADJUDICATOR_ROLES: [Role; 2] = [Role::SeniorAssociate, Role::LegalCounsel];

/// Visibility scope applied to every list query before any caller-supplied
/// filter. Non-privileged callers can never widen it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListScope {
    /// Privileged caller: all requests, optionally narrowed to one requester.
    All { requester: Option<UserId> },
    /// Non-privileged caller: own requests only, regardless of any filter
    /// supplied.
    Own(UserId),
}

impl ListScope {
    pub fn requester(&self) -> Option<&UserId> {
        match self {
            Self::All { requester } => requester.as_ref(),
            Self::Own(requester) => Some(requester),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RoleAuthority;

impl RoleAuthority {
    /// Any authenticated principal may submit any kind of request.
    pub fn can_submit(&self, _principal: &Principal, _kind: RequestKind) -> bool {
        true
    }

    pub fn can_adjudicate(&self, principal: &Principal) -> bool {
        ADJUDICATOR_ROLES.contains(&principal.role)
    }

    pub fn scope_for_list(
        &self,
        principal: &Principal,
        requested_requester: Option<UserId>,
    ) -> ListScope {
        if self.can_adjudicate(principal) {
            ListScope::All { requester: requested_requester }
        } else {
            ListScope::Own(principal.id.clone())
        }
    }
}
