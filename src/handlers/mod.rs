pub mod channels;
pub mod checkouts;
pub mod common;
pub mod gift_cards;
pub mod vouchers;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
