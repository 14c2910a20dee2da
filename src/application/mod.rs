pub mod probe_trait;
pub mod runner;

pub use probe_trait::{DatabaseProbe, FirstColumn};
pub use runner::run;
