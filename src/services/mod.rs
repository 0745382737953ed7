// Workflow core
pub mod receiving;
pub mod request_status;
pub mod requests;

// Supporting data
pub mod budgets;
pub mod catalog;
pub mod users;

pub use budgets::BudgetService;
pub use catalog::CatalogService;
pub use receiving::ReceivingService;
pub use requests::RequestService;
pub use users::UserService;
