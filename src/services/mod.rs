pub mod classifier;
pub mod reconstructor;
pub mod standardizer;
pub mod table_extractor;
pub mod validation;
