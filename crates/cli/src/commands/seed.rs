use crate::commands::{build_runtime, connect, load_config, CommandResult, Failure};
use carely_db::{migrations, DemoAnchor, DemoCatalogSeed};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoCatalogSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoCatalogSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<DemoAnchor>, Failure> = if verification.all_present {
            Ok(seed_result.anchors_seeded)
        } else {
            let failed = verification.failed_checks().collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(anchors) => CommandResult::success("seed", summary(&anchors)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(anchors: &[DemoAnchor]) -> String {
    let lines: Vec<String> = anchors
        .iter()
        .map(|anchor| {
            format!("  - anchor {} (member {}): {}", anchor.anchor_id, anchor.member_id, anchor.description)
        })
        .collect();
    format!("demo catalog loaded with {} anchors:\n{}", anchors.len(), lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
