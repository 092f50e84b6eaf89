use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageResidents,
    EditRoles,
    ManageFees,
    RecordPayments,
    ViewBalances,
    AssignIncidents,
    ViewAllIncidents,
    ReviewComplaints,
    ViewEvidence,
    DeleteRecords,
}

/// Права роли, проверяются один раз на операцию
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub manage_residents: bool,
    pub edit_roles: bool,
    pub manage_fees: bool,
    pub record_payments: bool,
    pub view_balances: bool,
    pub assign_incidents: bool,
    pub view_all_incidents: bool,
    pub review_complaints: bool,
    pub view_evidence: bool,
    pub delete_records: bool,
}

const SYNDIC: Capabilities = Capabilities {
    manage_residents: true,
    edit_roles: true,
    manage_fees: true,
    record_payments: true,
    view_balances: true,
    assign_incidents: true,
    view_all_incidents: true,
    review_complaints: true,
    view_evidence: true,
    delete_records: true,
};

const GUARD: Capabilities = Capabilities {
    manage_residents: false,
    edit_roles: false,
    manage_fees: false,
    record_payments: false,
    view_balances: false,
    assign_incidents: false,
    view_all_incidents: true,
    review_complaints: false,
    view_evidence: false,
    delete_records: false,
};

const RESIDENT: Capabilities = Capabilities {
    manage_residents: false,
    edit_roles: false,
    manage_fees: false,
    record_payments: false,
    view_balances: false,
    assign_incidents: false,
    view_all_incidents: false,
    review_complaints: false,
    view_evidence: false,
    delete_records: false,
};

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Syndic => SYNDIC,
            Role::Guard => GUARD,
            Role::Resident => RESIDENT,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageResidents => self.manage_residents,
            Capability::EditRoles => self.edit_roles,
            Capability::ManageFees => self.manage_fees,
            Capability::RecordPayments => self.record_payments,
            Capability::ViewBalances => self.view_balances,
            Capability::AssignIncidents => self.assign_incidents,
            Capability::ViewAllIncidents => self.view_all_incidents,
            Capability::ReviewComplaints => self.review_complaints,
            Capability::ViewEvidence => self.view_evidence,
            Capability::DeleteRecords => self.delete_records,
        }
    }
}

/// Синдик может управлять только своей резиденцией
pub async fn ensure_residence_syndic(
    pool: &PgPool,
    residence_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let owned: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM residences WHERE id = $1 AND syndic_id = $2")
            .bind(residence_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    match owned {
        Some(_) => Ok(()),
        None => Err(AppError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_syndic_manages_money() {
        for cap in [
            Capability::ManageFees,
            Capability::RecordPayments,
            Capability::ViewBalances,
        ] {
            assert!(Capabilities::for_role(Role::Syndic).allows(cap));
            assert!(!Capabilities::for_role(Role::Guard).allows(cap));
            assert!(!Capabilities::for_role(Role::Resident).allows(cap));
        }
    }

    #[test]
    fn test_guard_sees_all_incidents_but_cannot_assign() {
        let guard = Capabilities::for_role(Role::Guard);
        assert!(guard.allows(Capability::ViewAllIncidents));
        assert!(!guard.allows(Capability::AssignIncidents));
    }

    #[test]
    fn test_evidence_is_syndic_only() {
        assert!(Capabilities::for_role(Role::Syndic).allows(Capability::ViewEvidence));
        assert!(!Capabilities::for_role(Role::Resident).allows(Capability::ViewEvidence));
        assert!(!Capabilities::for_role(Role::Guard).allows(Capability::ViewEvidence));
    }
}
