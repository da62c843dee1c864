pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod model;
pub mod observer;
pub mod parser;
pub mod pipeline;
pub mod sink;

pub use error::{ExtractError, FetchError, PipelineError, SinkError};
pub use model::{DirectorDealing, Field};
pub use parser::Extractor;
pub use pipeline::{process_document, run, RunReport};
pub use sink::{Sink, SinkDispatcher};
