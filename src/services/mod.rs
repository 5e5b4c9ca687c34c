pub mod ai_manager;
pub mod geocoding;
pub mod json_extract;
pub mod news;
pub mod prompts;
pub mod providers;
pub mod simple_analyzer;
