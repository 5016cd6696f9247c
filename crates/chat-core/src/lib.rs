pub mod ports;
pub mod event_bus;
pub mod state;
pub mod store;
pub mod link;
pub mod reconciler;
pub mod reducer;
pub mod typing;
pub mod receipts;
pub mod session;
pub mod testing;
