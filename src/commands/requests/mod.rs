pub mod complete_request_command;
pub mod create_request_command;
pub mod delete_request_command;
pub mod priority_commands;
pub mod reopen_request_command;
pub mod review_request_command;
pub mod update_request_command;

// Re-export commands for easier access
pub use complete_request_command::CompleteRequestCommand;
pub use create_request_command::{
    CreatePurchaseRequestCommand, CreatePurchaseRequestResult, NewRequestItem,
};
pub use delete_request_command::DeletePurchaseRequestCommand;
pub use priority_commands::{RemovePriorityCommand, SetPriorityCommand, ToggleUrgentCommand};
pub use reopen_request_command::ReopenRequestCommand;
pub use review_request_command::ReviewRequestCommand;
pub use update_request_command::UpdatePurchaseRequestCommand;
