pub mod create_receipt_command;

pub use create_receipt_command::CreateReceiptCommand;
