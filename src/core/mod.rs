pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod input;
pub mod lifecycle;
pub mod pipeline;
pub mod signals;

#[cfg(test)]
mod sim_test;
