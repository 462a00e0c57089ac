//! Roles, capabilities and the authenticated principal.
//!
//! Identity itself is owned elsewhere: a bearer token is resolved to a
//! [`Principal`] by an [`IdentityProvider`], and handlers check the
//! principal's role against the [`Capability`] an operation needs.
//!
//! | Capability           | Roles                                        |
//! |----------------------|----------------------------------------------|
//! | `ManageRooms`        | admin                                        |
//! | `ViewRooms`          | admin, hcp, frontdesk, dataentry             |
//! | `ManageAdmissions`   | admin, frontdesk                             |
//! | `ViewAdmissions`     | admin, hcp, frontdesk                        |
//! | `ManageSlots`        | admin, hcp (own slots)                       |
//! | `BookAppointments`   | admin, hcp, frontdesk, patient (own)         |
//! | `UpdateAppointments` | admin, hcp, frontdesk                        |
//! | `ViewAppointments`   | every role (patients see their own only)     |

pub mod identity;
pub mod middleware;

pub use identity::{
    IdentityChain, IdentityError, IdentityProvider, SessionDirectory, StaticIdentityProvider,
};
pub use middleware::{Authenticated, BearerToken, Identity};

use crate::error::{HospitalError, Result};
use crate::types::{HcpId, PatientId, UnknownVariant};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Role of an authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator.
    Admin,
    /// Health-care professional.
    Hcp,
    /// Front desk staff.
    FrontDesk,
    /// Data entry staff.
    DataEntry,
    /// Patient.
    Patient,
}

impl Role {
    /// Stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Hcp => "hcp",
            Self::FrontDesk => "frontdesk",
            Self::DataEntry => "dataentry",
            Self::Patient => "patient",
        }
    }

    /// Whether the role grants `capability`, before any ownership check.
    #[must_use]
    pub const fn allows(self, capability: Capability) -> bool {
        use Capability as C;
        match self {
            Self::Admin => true,
            Self::Hcp => matches!(
                capability,
                C::ViewRooms
                    | C::ViewAdmissions
                    | C::ManageSlots
                    | C::BookAppointments
                    | C::UpdateAppointments
                    | C::ViewAppointments
            ),
            Self::FrontDesk => matches!(
                capability,
                C::ViewRooms
                    | C::ManageAdmissions
                    | C::ViewAdmissions
                    | C::BookAppointments
                    | C::UpdateAppointments
                    | C::ViewAppointments
            ),
            Self::DataEntry => matches!(capability, C::ViewRooms | C::ViewAppointments),
            Self::Patient => matches!(capability, C::BookAppointments | C::ViewAppointments),
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "hcp" => Ok(Self::Hcp),
            "frontdesk" => Ok(Self::FrontDesk),
            "dataentry" => Ok(Self::DataEntry),
            "patient" => Ok(Self::Patient),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation family guarded by role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create, change and delete rooms.
    ManageRooms,
    /// List rooms.
    ViewRooms,
    /// Admit, discharge and take payments.
    ManageAdmissions,
    /// List admitted patients.
    ViewAdmissions,
    /// Publish and delete slots.
    ManageSlots,
    /// Book appointments.
    BookAppointments,
    /// Change appointment status.
    UpdateAppointments,
    /// Read appointments.
    ViewAppointments,
}

/// The authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Role.
    pub role: Role,
    /// Account id in the user directory, when known.
    pub user_id: Option<i64>,
    /// Professional record of an `hcp` caller.
    pub hcp_id: Option<HcpId>,
    /// Patient record of a `patient` caller.
    pub patient_id: Option<PatientId>,
    /// Display name.
    pub name: String,
}

impl Principal {
    /// Fail unless the role grants `capability`.
    ///
    /// # Errors
    ///
    /// `Forbidden`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(HospitalError::forbidden(format!(
                "role {} may not perform {capability:?}",
                self.role
            )))
        }
    }

    /// Fail for patient callers; listings spanning many patients are staff only.
    ///
    /// # Errors
    ///
    /// `Forbidden`.
    pub fn require_staff(&self) -> Result<()> {
        if self.role == Role::Patient {
            return Err(HospitalError::forbidden("patients may only access their own records"));
        }
        Ok(())
    }

    /// Fail unless the caller may act for professional `hcp`: any admin, or
    /// the professional themself.
    ///
    /// # Errors
    ///
    /// `Forbidden`.
    pub fn require_hcp(&self, hcp: HcpId) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Hcp if self.hcp_id == Some(hcp) => Ok(()),
            _ => Err(HospitalError::forbidden(format!(
                "not allowed to act for professional {hcp}"
            ))),
        }
    }

    /// Fail if a patient caller touches another patient's records. Staff
    /// roles pass.
    ///
    /// # Errors
    ///
    /// `Forbidden`.
    pub fn require_patient_scope(&self, patient: PatientId) -> Result<()> {
        if self.role == Role::Patient && self.patient_id != Some(patient) {
            return Err(HospitalError::forbidden(format!(
                "not allowed to access records of patient {patient}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Capability; 8] = [
        Capability::ManageRooms,
        Capability::ViewRooms,
        Capability::ManageAdmissions,
        Capability::ViewAdmissions,
        Capability::ManageSlots,
        Capability::BookAppointments,
        Capability::UpdateAppointments,
        Capability::ViewAppointments,
    ];

    fn principal(role: Role) -> Principal {
        Principal {
            role,
            user_id: None,
            hcp_id: None,
            patient_id: None,
            name: role.to_string(),
        }
    }

    #[test]
    fn admin_may_do_everything() {
        assert!(ALL.iter().all(|c| Role::Admin.allows(*c)));
    }

    #[test]
    fn every_role_may_view_appointments() {
        for role in [Role::Admin, Role::Hcp, Role::FrontDesk, Role::DataEntry, Role::Patient] {
            assert!(role.allows(Capability::ViewAppointments), "{role}");
        }
    }

    #[test]
    fn only_admin_manages_rooms() {
        for role in [Role::Hcp, Role::FrontDesk, Role::DataEntry, Role::Patient] {
            assert!(!role.allows(Capability::ManageRooms), "{role}");
        }
    }

    #[test]
    fn frontdesk_admits_but_does_not_publish_slots() {
        assert!(Role::FrontDesk.allows(Capability::ManageAdmissions));
        assert!(!Role::FrontDesk.allows(Capability::ManageSlots));
    }

    #[test]
    fn hcp_acts_only_for_itself() {
        let mut hcp = principal(Role::Hcp);
        hcp.hcp_id = Some(HcpId::new(4));
        assert!(hcp.require_hcp(HcpId::new(4)).is_ok());
        assert!(hcp.require_hcp(HcpId::new(5)).is_err());
        assert!(principal(Role::Admin).require_hcp(HcpId::new(5)).is_ok());
    }

    #[test]
    fn patients_are_scoped_to_their_own_records() {
        let mut patient = principal(Role::Patient);
        patient.patient_id = Some(PatientId::new(9));
        assert!(patient.require_patient_scope(PatientId::new(9)).is_ok());
        assert!(patient.require_patient_scope(PatientId::new(10)).is_err());
        assert!(principal(Role::FrontDesk).require_patient_scope(PatientId::new(10)).is_ok());
        assert!(patient.require_staff().is_err());
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("FrontDesk".parse::<Role>().ok(), Some(Role::FrontDesk));
        assert!("nurse".parse::<Role>().is_err());
    }
}
