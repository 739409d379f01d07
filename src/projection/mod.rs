pub mod assembler;
pub mod sorting;
pub mod views;

pub use assembler::Assembler;
pub use views::{MarketView, MatchView, OfferView, OutcomeView, Participant, Venue};
