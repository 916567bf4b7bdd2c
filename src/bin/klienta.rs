use anyhow::Result;
use klienta::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    match action {
        Action::Server { .. } => actions::server::execute(action).await?,
    }

    Ok(())
}
