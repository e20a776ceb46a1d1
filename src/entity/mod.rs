pub mod audit_logs;
pub mod bookings;
pub mod cars;
pub mod favorites;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use bookings::Entity as Bookings;
pub use cars::Entity as Cars;
pub use favorites::Entity as Favorites;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
