use crate::commands::{current_thread_runtime, CommandResult, EXIT_RUNTIME};
use joblab_core::config::{AppConfig, LoadOptions};
use joblab_db::{connect, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("migrate", error),
    };

    let runtime = match current_thread_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string()))?;
        migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string()))?;
        pool.close().await;
        Ok::<(), (&'static str, String)>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending cv store migrations"),
        Err((error_class, message)) => {
            CommandResult::failure("migrate", error_class, message, EXIT_RUNTIME)
        }
    }
}
