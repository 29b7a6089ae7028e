pub mod constraints;
pub mod criteria;
pub mod interval;
pub mod listing;
