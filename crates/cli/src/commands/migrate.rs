use crate::commands::{build_runtime, load_config, CommandResult};
use outreach_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let known = migrations::MIGRATOR
            .iter()
            .filter(|migration| !migration.migration_type.is_down_migration())
            .count();
        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(known)
    });

    match result {
        Ok(known) => CommandResult::success(
            "migrate",
            format!("session memory schema is current ({known} migration(s) known)"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
