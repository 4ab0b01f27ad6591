mod args;
mod demo_command;

use smartlock::Result;
pub use args::Args;

pub async fn run(args: Args) -> Result<()> {
    demo_command::execute_demo(args).await
}
