pub mod etl;
pub mod export;
pub mod export_pipeline;
pub mod projector;
pub mod store;

pub use crate::domain::model::{Direction, Itinerary, Record};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
