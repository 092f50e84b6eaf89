use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SyndicHub API",
        version = "1.0.0",
        description = "Backend API для SyndicHub - управления жилыми резиденциями: взносы, платежи, жители, жалобы и инциденты",
        contact(
            name = "SyndicHub Team",
            email = "support@syndichub.ma"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "users", description = "Профиль текущего пользователя"),
        (name = "residences", description = "Резиденция и сводка синдика"),
        (name = "residents", description = "Жители и подтверждение регистрации"),
        (name = "fee-rules", description = "Правила периодических взносов"),
        (name = "fees", description = "Начисленные взносы"),
        (name = "payments", description = "Платежи, балансы и квитанции"),
        (name = "complaints", description = "Жалобы между жителями"),
        (name = "incidents", description = "Инциденты и заявки"),
        (name = "uploads", description = "Загрузка файлов")
    ),
    paths(
        // Users
        crate::api::users::get_me,
        // Residences
        crate::api::residences::get_current_residence,
        crate::api::residences::get_dashboard,
        // Residents
        crate::api::residents::list_residents,
        crate::api::residents::lookup_email,
        crate::api::residents::create_resident,
        crate::api::residents::get_resident,
        crate::api::residents::update_resident,
        crate::api::residents::remove_resident,
        crate::api::residents::approve_registration,
        crate::api::residents::reject_registration,
        // Fee rules
        crate::api::fee_rules::list_rules,
        crate::api::fee_rules::create_rule,
        crate::api::fee_rules::get_rule,
        crate::api::fee_rules::update_rule,
        crate::api::fee_rules::delete_rule,
        crate::api::fee_rules::generate_fees,
        crate::api::fee_rules::send_reminders,
        // Fees
        crate::api::fees::list_fees,
        crate::api::fees::get_summary,
        crate::api::fees::create_fee,
        crate::api::fees::get_fee,
        crate::api::fees::delete_fee,
        // Payments
        crate::api::payments::list_payments,
        crate::api::payments::settle_fees,
        crate::api::payments::record_custom_payment,
        crate::api::payments::get_balances,
        crate::api::payments::get_payment,
        crate::api::payments::correct_payment_status,
        crate::api::payments::get_receipt,
        // Complaints
        crate::api::complaints::list_complaints,
        crate::api::complaints::create_complaint,
        crate::api::complaints::get_complaint,
        crate::api::complaints::update_complaint_status,
        crate::api::complaints::delete_complaint,
        // Incidents
        crate::api::incidents::list_incidents,
        crate::api::incidents::create_incident,
        crate::api::incidents::get_incident,
        crate::api::incidents::update_incident_status,
        crate::api::incidents::assign_incident,
        crate::api::incidents::delete_incident,
        // Uploads
        crate::api::uploads::upload_file,
    ),
    components(
        schemas(
            crate::api::SuccessResponse,
            // Profiles
            crate::models::Role,
            crate::models::Profile,
            crate::models::Resident,
            crate::models::MembershipResponse,
            crate::models::MeResponse,
            crate::models::CreateResidentRequest,
            crate::models::UpdateResidentRequest,
            crate::models::RejectRegistrationRequest,
            crate::models::EmailLookupResponse,
            // Residences
            crate::models::Residence,
            crate::models::Balances,
            crate::models::DashboardResponse,
            // Fees
            crate::models::CoveragePeriodType,
            crate::models::LegacyFrequency,
            crate::models::FeeRule,
            crate::models::FeeStatus,
            crate::models::FeeResponse,
            crate::models::FeeSummary,
            crate::models::CreateFeeRuleRequest,
            crate::models::UpdateFeeRuleRequest,
            crate::models::GenerateFeesRequest,
            crate::models::GenerationReport,
            crate::models::DeletionAction,
            crate::models::DeleteRuleResponse,
            crate::models::CreateFeeRequest,
            crate::models::ReminderReport,
            // Payments
            crate::models::PaymentMethod,
            crate::models::PaymentStatus,
            crate::models::Payment,
            crate::models::SettleFeesRequest,
            crate::models::SettlementResponse,
            crate::models::CustomPaymentRequest,
            crate::models::CorrectPaymentStatusRequest,
            crate::models::ReceiptDocument,
            // Complaints
            crate::models::ComplaintPrivacy,
            crate::models::ComplaintStatus,
            crate::models::ComplaintEvidence,
            crate::models::ComplaintResponse,
            crate::models::CreateComplaintResponse,
            crate::models::UpdateComplaintStatusRequest,
            // Incidents
            crate::models::IncidentStatus,
            crate::models::Incident,
            crate::models::CreateIncidentRequest,
            crate::models::UpdateIncidentStatusRequest,
            crate::models::AssignIncidentRequest,
            // Uploads
            crate::models::UploadedFile,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}
