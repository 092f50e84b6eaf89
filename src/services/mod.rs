pub mod auth_service;
pub mod billing_service;
pub mod complaint_service;
pub mod email_service;
pub mod file_service;
pub mod payment_service;
pub mod receipt_service;
pub mod resident_service;

pub use auth_service::AuthService;
pub use billing_service::BillingService;
pub use email_service::EmailService;
pub use file_service::FileService;
pub use payment_service::PaymentService;
pub use receipt_service::ReceiptService;
pub use resident_service::ResidentService;
