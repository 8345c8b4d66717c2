pub mod colbert;

pub use colbert::{ColbertModel, ColbertOptions};
