//! Circulation core: loan lifecycle, reservation queues and the stock ledger

pub mod coordinator;
pub mod estimator;
pub mod ledger;
pub mod loan_state;
pub mod queue;

pub use coordinator::{CirculationCoordinator, LoanRequestOutcome, PassReport};
pub use ledger::StockLedger;
pub use loan_state::{LoanAction, LoanStateMachine};
pub use queue::{Conversion, QueueRemoval, ReservationQueue};
