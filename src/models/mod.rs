pub mod movie;
pub mod payment;
pub mod setting;
pub mod ticket;
pub mod user;

pub use movie::Movie;
pub use payment::{Payment, PaymentStatus};
pub use setting::Setting;
pub use ticket::{Ticket, TicketType};
pub use user::User;
