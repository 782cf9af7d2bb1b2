//! Data models for circulation

pub mod loan;
pub mod reservation;
pub mod title;
pub mod user;

// Re-export commonly used types
pub use loan::{Loan, LoanStatus, NewLoan};
pub use reservation::{NewReservation, Reservation};
pub use title::{CreateTitle, StockPool, Title};
pub use user::{Actor, Role, UserClaims, UserContact};
