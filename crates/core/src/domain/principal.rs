use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::UserId;

/// Fixed set of firm roles. Privilege is decided by exact membership in the
/// adjudicator allow-list (`authority::ADJUDICATOR_ROLES`), not by rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Intern,
    Paralegal,
    Associate,
    SeniorAssociate,
    LegalCounsel,
    OfficeManager,
}

impl Role {
    /// Display name as stored in the user directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intern => "Intern",
            Self::Paralegal => "Paralegal",
            Self::Associate => "Associate",
            Self::SeniorAssociate => "Senior Associate",
            Self::LegalCounsel => "Legal Counsel",
            Self::OfficeManager => "Office Manager",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intern" => Ok(Self::Intern),
            "paralegal" => Ok(Self::Paralegal),
            "associate" => Ok(Self::Associate),
            "senior associate" | "senior_associate" => Ok(Self::SeniorAssociate),
            "legal counsel" | "legal_counsel" => Ok(Self::LegalCounsel),
            "office manager" | "office_manager" => Ok(Self::OfficeManager),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated actor behind a request, as resolved by the identity
/// collaborator: an id plus a directory role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: UserId(id.into()), role }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn roles_parse_display_names_and_snake_case() {
        assert_eq!("Senior Associate".parse::<Role>(), Ok(Role::SeniorAssociate));
        assert_eq!("senior_associate".parse::<Role>(), Ok(Role::SeniorAssociate));
        assert_eq!("Legal Counsel".parse::<Role>(), Ok(Role::LegalCounsel));
        assert_eq!("intern".parse::<Role>(), Ok(Role::Intern));
        assert!("Partner".parse::<Role>().is_err());
    }

    #[test]
    fn role_display_names_round_trip() {
        for role in [
            Role::Intern,
            Role::Paralegal,
            Role::Associate,
            Role::SeniorAssociate,
            Role::LegalCounsel,
            Role::OfficeManager,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }
}
