mod account;
mod bar;
mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod signal;
mod time_in_force;
mod trade;

pub use account::AccountState;
pub use bar::{Bar, Quote};
pub use order::{Order, OrderId, OrderRequest, OrderTransition};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::Position;
pub use side::Side;
pub use signal::{Signal, SignalAction};
pub use time_in_force::TimeInForce;
pub use trade::{CloseReason, TradeRecord};
