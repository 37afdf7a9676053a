use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = i64;

/// Account role as recorded by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Physician,
    Pharmacy,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Physician => "physician",
            UserRole::Pharmacy => "pharmacy",
            UserRole::Admin => "admin",
        }
    }

    /// Unknown tags fall back to `Patient`, the least privileged role.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "physician" => UserRole::Physician,
            "pharmacy" => UserRole::Pharmacy,
            "admin" => UserRole::Admin,
            _ => UserRole::Patient,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role snapshot stored on a participant row when a conversation is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Patient,
    Physician,
    Pharmacist,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Patient => "patient",
            ParticipantRole::Physician => "physician",
            ParticipantRole::Pharmacist => "pharmacist",
        }
    }
}

impl From<UserRole> for ParticipantRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Physician => ParticipantRole::Physician,
            UserRole::Pharmacy => ParticipantRole::Pharmacist,
            UserRole::Patient | UserRole::Admin => ParticipantRole::Patient,
        }
    }
}

/// The slice of a user record the messaging core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub role: UserRole,
    pub is_active: bool,
}

impl UserIdentity {
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self {
            id,
            role,
            is_active: true,
        }
    }

    pub fn participant_role(&self) -> ParticipantRole {
        self.role.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_role_mapping() {
        assert_eq!(
            ParticipantRole::from(UserRole::Pharmacy),
            ParticipantRole::Pharmacist
        );
        assert_eq!(
            ParticipantRole::from(UserRole::Physician),
            ParticipantRole::Physician
        );
        assert_eq!(ParticipantRole::from(UserRole::Admin), ParticipantRole::Patient);
    }

    #[test]
    fn test_unknown_role_tag_defaults_to_patient() {
        assert_eq!(UserRole::from_tag("PHYSICIAN"), UserRole::Physician);
        assert_eq!(UserRole::from_tag("nurse"), UserRole::Patient);
    }
}
