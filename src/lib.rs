#![forbid(unsafe_code)]

pub mod cli;
pub mod fetch;
pub mod gold;
pub mod logging;
pub mod model;
pub mod openai;
pub mod passage;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod throttle;
