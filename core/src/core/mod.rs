pub mod step;
pub mod vars;

pub use step::{step_handler, StepDef, StepHandler};
pub use vars::Vars;
