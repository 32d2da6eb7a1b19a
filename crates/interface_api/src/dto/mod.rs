//! Request and response data transfer objects

pub mod bordereau;
pub mod dispatch;
