pub mod booking;
pub mod notification;
pub mod payment;
pub mod ride;
pub mod route_distance;
pub mod user;
