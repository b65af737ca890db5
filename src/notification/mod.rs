//! The application-wide notification message.

mod notification;

pub use notification::{Notification, DEFAULT_GREETING};
