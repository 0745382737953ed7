pub mod item_budget;
pub mod item_receipt;
pub mod product;
pub mod purchase_request;
pub mod request_item;
pub mod sector;
pub mod supplier;
pub mod user;
