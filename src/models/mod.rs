// Domain enums shared by entities, commands and handlers
pub mod role;
pub mod status;

pub use role::Role;
pub use status::{
    ItemStatus, Priority, ProductStatus, ReceiptCondition, ReceivingStatus, RequestStatus,
};
