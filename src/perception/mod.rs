pub mod crop;
pub mod external_tool;
pub mod region;
pub mod screenshot;
pub mod traits;
pub mod types;
