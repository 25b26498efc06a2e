pub mod dispatcher;
pub mod file_preprocessor;
pub mod language_service;
pub mod log_collector_layer;

pub use dispatcher::{ApiConversationSaver, LIST_RETRY_DELAY, RequestDispatcher, TurnState};
pub use file_preprocessor::{
    MAX_ATTACHMENT_SIZE, PreparedFile, PreprocessError, PreprocessResult, prepare_bytes,
    prepare_file,
};
pub use language_service::LanguageService;
pub use log_collector_layer::LogCollectorLayer;
