pub mod summary;
pub mod taxonomy;
pub mod weights;
