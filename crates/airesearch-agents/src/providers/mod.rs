//! Concrete search and text-generation capabilities.

mod demo;
mod duckduckgo;
mod openai;

pub use demo::DemoSearch;
pub use duckduckgo::{DuckDuckGoSearch, decode_result_link, parse_results};
pub use openai::OpenAiGenerator;
