//! # Shelfwatch Notify
//! Decides who gets told and when: the quiet-hours window, per-recipient
//! frequency throttling, and best-effort retried dispatch.

pub mod dispatch;
pub mod quiet;
pub mod throttle;

pub use dispatch::Dispatcher;
pub use quiet::is_quiet_hours;
pub use throttle::should_notify;
