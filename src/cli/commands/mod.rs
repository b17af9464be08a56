pub mod audit;
pub mod schemas;
