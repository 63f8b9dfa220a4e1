mod catalog;

pub use catalog::ModelCatalog;
