pub mod config_service;
pub mod http_history_repository;
pub mod in_memory_history_repository;
pub mod paths;

pub use config_service::ConfigService;
pub use http_history_repository::HttpHistoryRepository;
pub use in_memory_history_repository::InMemoryHistoryRepository;
pub use paths::CasegenPaths;
