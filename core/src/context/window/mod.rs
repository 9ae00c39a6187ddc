pub mod budget;
pub mod token_counter;

pub use budget::{ModelLimits, TokenBudget};
pub use token_counter::{create_counter, CountError, EstimateCounter, TiktokenCounter, TokenCounter};
