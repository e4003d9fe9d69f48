mod add;
mod classify;
mod compare;
mod search;

pub use add::*;
pub use classify::*;
pub use compare::*;
pub use search::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
