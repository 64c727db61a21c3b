use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use trace_scan::ScanConfig;

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    platform: String,
    arch: String,
    config: ScanConfig,
}

pub fn execute(args: InfoArgs) -> i32 {
    let config = match ScanConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        config,
    };

    if args.json {
        if !output::emit_json(&info, false, None) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        let constraints = &info.config.constraints;
        println!("tracescan CLI v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!();
        println!("Sample interval: {} ms", info.config.sample_interval_ms);
        match constraints.facing {
            Some(facing) => println!("Preferred camera: {:?}", facing),
            None => println!("Preferred camera: any"),
        }
        if let (Some(w), Some(h)) = (constraints.ideal_width, constraints.ideal_height) {
            println!("Ideal resolution: {}x{}", w, h);
        }
        println!(
            "Fallback camera: {}",
            if info.config.allow_fallback { "enabled" } else { "disabled" }
        );
        match info.config.idle_timeout_ms {
            Some(ms) => println!("Idle timeout: {} ms", ms),
            None => println!("Idle timeout: none"),
        }
        println!("Overrides: $TRACE_SCAN_INTERVAL_MS, $TRACE_SCAN_FACING, $TRACE_SCAN_IDEAL_WIDTH,");
        println!("           $TRACE_SCAN_IDEAL_HEIGHT, $TRACE_SCAN_IDLE_TIMEOUT_MS, $TRACE_SCAN_FALLBACK");
    }

    exit_codes::SUCCESS
}
