use std::io::{self, Write};
use std::sync::Arc;

use gvm_core::{Error, Executor, GceProvider, Result, record};

use crate::output;
use crate::{Cli, Command};

pub async fn run(cli: Cli) -> Result<()> {
    // Validation happens at load, before any provider call.
    let desired = record::load(&cli.config)?;

    let provider = GceProvider::from_env(&desired)?;
    let exec = Executor::new(Arc::new(provider), &cli.config);

    match cli.command {
        Command::Create => {
            let observed = exec.create(&desired).await?;
            output::print_status(&desired, &observed);
            output::print_access_info(&desired, &observed);
        }
        Command::Start => {
            let observed = exec.start(&desired).await?;
            output::print_access_info(&desired, &observed);
        }
        Command::Stop => {
            exec.stop(&desired).await?;
            println!("Instance {} stopped", desired.vm_name);
        }
        Command::Restart => {
            let observed = exec.restart(&desired).await?;
            output::print_access_info(&desired, &observed);
        }
        Command::Status => {
            // NOT_FOUND is an answer here, not a failure.
            let observed = exec.status(&desired).await?;
            output::print_status(&desired, &observed);
        }
        Command::Info => {
            let observed = exec.status(&desired).await?;
            if !observed.exists {
                return Err(Error::NotFound(format!(
                    "instance {} does not exist",
                    desired.vm_name
                )));
            }
            output::print_access_info(&desired, &observed);
        }
        Command::Summary => {
            let observed = exec.status(&desired).await?;
            output::print_summary(&desired, &observed);
        }
        Command::Destroy { yes } => {
            if !yes && !confirm_destroy(&desired.vm_name)? {
                println!("Deletion cancelled");
                return Ok(());
            }
            exec.destroy(&desired).await?;
            println!("Instance {} deleted", desired.vm_name);
        }
    }

    Ok(())
}

fn confirm_destroy(vm_name: &str) -> Result<bool> {
    print!("Delete instance {vm_name}? (yes/no): ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
