//! Build orchestration: a driver helper writes a plan into a scratch
//! directory, the plan's tools run one after another, and the artifact is
//! moved into place.

mod builder;
mod error;
mod plan;
mod toolchain;

pub use builder::{BuildRequest, Builder};
pub use error::{BuildError, Succeeded};
pub use plan::{parse_plan, Command};
pub use toolchain::Toolchain;
