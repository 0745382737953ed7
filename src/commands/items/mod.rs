pub mod add_item_command;
pub mod delete_item_command;
pub mod review_item_command;
pub mod update_item_command;

// Re-export commands for easier access
pub use add_item_command::AddItemCommand;
pub use delete_item_command::DeleteItemCommand;
pub use review_item_command::{ReviewItemCommand, ReviewItemResult};
pub use update_item_command::UpdateItemCommand;
