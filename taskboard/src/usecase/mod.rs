// Use cases invoked by the request router and the automation layer

pub mod actions;
pub mod boards;
pub mod checkout;
pub mod projects;

pub use actions::ActionService;
pub use boards::BoardService;
pub use checkout::CheckoutTask;
pub use projects::ProjectService;
