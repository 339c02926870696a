mod climate;
mod deals;
mod offers;
mod rounds;

pub use climate::ClimateSystem;
pub use deals::DealSystem;
pub use offers::OfferSystem;
pub use rounds::RoundSystem;
