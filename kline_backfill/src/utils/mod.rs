pub mod clock;
pub mod date_expr;

pub use clock::{Clock, FixedClock, SystemClock};
pub use date_expr::{date_to_millis, parse_date_expr};
