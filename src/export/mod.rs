pub mod csv_writer;
pub mod projector;
pub mod series;

pub use projector::Table;
pub use series::SeriesRow;
