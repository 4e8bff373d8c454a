pub mod channel;
pub mod checkout;
pub mod gift_card;
pub mod voucher;

pub use channel::{Channel, InstrumentFlags, InstrumentKind};
pub use checkout::{Checkout, CheckoutStatus, LineItem, ShippingSelection};
pub use gift_card::{ExpiryInput, ExpiryPeriod, GiftCard, PeriodUnit};
pub use voucher::{DiscountKind, Voucher};
