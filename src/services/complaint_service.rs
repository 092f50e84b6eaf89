use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::Capabilities;
use crate::models::{Complaint, ComplaintPrivacy, ComplaintStatus, Role};

pub const SELF_LABEL: &str = "You";
pub const ANONYMOUS_LABEL: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplainantLabel {
    You,
    Anonymous,
    Name(String),
}

impl ComplainantLabel {
    pub fn into_display(self) -> String {
        match self {
            Self::You => SELF_LABEL.to_string(),
            Self::Anonymous => ANONYMOUS_LABEL.to_string(),
            Self::Name(name) => name,
        }
    }
}

/// Как показать заявителя конкретному зрителю
pub fn complainant_label(
    complaint: &Complaint,
    complainant_name: &str,
    viewer_id: Uuid,
    viewer_role: Role,
) -> ComplainantLabel {
    if viewer_role == Role::Syndic {
        return ComplainantLabel::Name(complainant_name.to_string());
    }
    if viewer_id == complaint.complainant_id {
        return ComplainantLabel::You;
    }
    if viewer_id == complaint.complained_about_id
        && complaint.privacy == ComplaintPrivacy::Anonymous
    {
        return ComplainantLabel::Anonymous;
    }
    ComplainantLabel::Name(complainant_name.to_string())
}

/// Доказательства видит только синдик, независимо от приватности
pub fn can_view_evidence(viewer_role: Role) -> bool {
    Capabilities::for_role(viewer_role).view_evidence
}

/// Житель видит только жалобы, где он заявитель или фигурант
pub fn can_view_complaint(complaint: &Complaint, viewer_id: Uuid, viewer_role: Role) -> bool {
    Capabilities::for_role(viewer_role).review_complaints
        || viewer_id == complaint.complainant_id
        || viewer_id == complaint.complained_about_id
}

pub fn check_status_transition(current: ComplaintStatus, next: ComplaintStatus) -> AppResult<()> {
    use ComplaintStatus::*;

    let allowed = matches!(
        (current, next),
        (Submitted, Reviewed) | (Submitted, Resolved) | (Reviewed, Resolved)
    );
    if allowed {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Недопустимый переход статуса жалобы: {:?} -> {:?}",
            current, next
        )))
    }
}

/// Жалоба создаётся даже при ошибках загрузки, пользователь узнаёт сколько файлов не прикрепилось
pub fn upload_summary(uploaded: usize, failed: usize) -> String {
    let total = uploaded + failed;
    if failed == 0 {
        "Complaint created".to_string()
    } else {
        format!(
            "Complaint created but {} of {} uploads failed",
            failed, total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Parties {
        complainant: Uuid,
        accused: Uuid,
        bystander: Uuid,
    }

    fn complaint(privacy: ComplaintPrivacy) -> (Complaint, Parties) {
        let parties = Parties {
            complainant: Uuid::new_v4(),
            accused: Uuid::new_v4(),
            bystander: Uuid::new_v4(),
        };
        let complaint = Complaint {
            id: Uuid::new_v4(),
            residence_id: Uuid::new_v4(),
            complainant_id: parties.complainant,
            complained_about_id: parties.accused,
            reason: "noise".to_string(),
            privacy,
            title: "Bruit la nuit".to_string(),
            description: "Musique après minuit".to_string(),
            status: ComplaintStatus::Submitted,
            resolution_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (complaint, parties)
    }

    #[test]
    fn test_syndic_always_sees_real_name() {
        let (c, _) = complaint(ComplaintPrivacy::Anonymous);
        assert_eq!(
            complainant_label(&c, "Hicham", Uuid::new_v4(), Role::Syndic),
            ComplainantLabel::Name("Hicham".to_string())
        );
    }

    #[test]
    fn test_complainant_sees_you() {
        let (c, p) = complaint(ComplaintPrivacy::Anonymous);
        assert_eq!(
            complainant_label(&c, "Hicham", p.complainant, Role::Resident),
            ComplainantLabel::You
        );
    }

    #[test]
    fn test_accused_sees_anonymous_when_anonymous() {
        let (c, p) = complaint(ComplaintPrivacy::Anonymous);
        let label = complainant_label(&c, "Hicham", p.accused, Role::Resident);
        assert_eq!(label.into_display(), "Anonymous");
    }

    #[test]
    fn test_accused_sees_name_when_private() {
        let (c, p) = complaint(ComplaintPrivacy::Private);
        assert_eq!(
            complainant_label(&c, "Hicham", p.accused, Role::Resident),
            ComplainantLabel::Name("Hicham".to_string())
        );
    }

    #[test]
    fn test_other_viewer_falls_back_to_name() {
        let (c, p) = complaint(ComplaintPrivacy::Anonymous);
        assert_eq!(
            complainant_label(&c, "Hicham", p.bystander, Role::Guard),
            ComplainantLabel::Name("Hicham".to_string())
        );
    }

    #[test]
    fn test_evidence_visibility_ignores_privacy() {
        assert!(can_view_evidence(Role::Syndic));
        assert!(!can_view_evidence(Role::Resident));
        assert!(!can_view_evidence(Role::Guard));
    }

    #[test]
    fn test_bystander_resident_cannot_open_complaint() {
        let (c, p) = complaint(ComplaintPrivacy::Private);
        assert!(!can_view_complaint(&c, p.bystander, Role::Resident));
        assert!(can_view_complaint(&c, p.accused, Role::Resident));
        assert!(can_view_complaint(&c, p.bystander, Role::Syndic));
    }

    #[test]
    fn test_resolved_complaint_is_terminal() {
        assert!(check_status_transition(ComplaintStatus::Submitted, ComplaintStatus::Reviewed).is_ok());
        assert!(check_status_transition(ComplaintStatus::Reviewed, ComplaintStatus::Resolved).is_ok());
        assert!(check_status_transition(ComplaintStatus::Resolved, ComplaintStatus::Reviewed).is_err());
        assert!(check_status_transition(ComplaintStatus::Reviewed, ComplaintStatus::Submitted).is_err());
    }

    #[test]
    fn test_partial_upload_message() {
        assert_eq!(upload_summary(3, 0), "Complaint created");
        assert_eq!(
            upload_summary(1, 2),
            "Complaint created but 2 of 3 uploads failed"
        );
    }
}
