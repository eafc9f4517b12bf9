pub mod frame;
pub mod reader;
pub mod writer;

pub use frame::{Record, MAGIC};
pub use reader::PackageReader;
pub use writer::PackageWriter;
