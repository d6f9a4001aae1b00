use clap::Subcommand;
use wastewise_core::PermissionState;

use crate::platform::open_engine;

#[derive(Subcommand)]
pub enum PermissionAction {
    /// Show the current permission state
    Status,
    /// Ask for permission (only prompts while undecided)
    Request,
    /// Forget the stored answer
    Reset,
}

pub async fn run(action: PermissionAction) -> Result<(), Box<dyn std::error::Error>> {
    let (db, manager) = open_engine()?;

    match action {
        PermissionAction::Status => {
            println!("{}", manager.permission_state());
        }
        PermissionAction::Request => {
            if manager.request_permission().await {
                println!("Notifications allowed.");
            } else if manager.permission_state() == PermissionState::Denied {
                println!("Notifications blocked. Run `permission reset` to be asked again.");
            } else {
                println!("No answer given.");
            }
        }
        PermissionAction::Reset => {
            crate::platform::StoredPermission::new(db).reset()?;
            println!("permission reset");
        }
    }
    Ok(())
}
