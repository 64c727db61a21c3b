use crate::cli::ErrorsArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use trace_scan::ScanError;

#[derive(Serialize)]
struct ErrorInfo {
    kind: &'static str,
    message: String,
}

pub fn execute(args: ErrorsArgs) -> i32 {
    let errors: Vec<ErrorInfo> = ScanError::catalog()
        .iter()
        .map(|e| ErrorInfo {
            kind: e.kind(),
            message: e.user_message(),
        })
        .collect();

    if args.json {
        if !output::emit_json(&errors, false, None) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("Scan error kinds:\n");
        println!("  {:<26} {}", "Kind", "Message");
        println!("  {}", "-".repeat(72));
        for e in &errors {
            println!("  {:<26} {}", e.kind, e.message);
        }
    }

    exit_codes::SUCCESS
}
