use crate::cli::SimulateArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use trace_scan::{
    BatchReference, CameraScenario, ConfigError, EmbeddedTextDecoder, ScanConfig, ScanEvent,
    ScanSession, ScanState, SessionSnapshot, SimulatedCamera, Termination,
};

/// Bounds a simulated run when neither the flag nor the environment sets a timeout
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

#[derive(Serialize)]
struct SimulateOutput {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    batch: Option<BatchReference>,
}

pub async fn execute(args: SimulateArgs) -> i32 {
    let scenario = match CameraScenario::from_file(&args.scenario) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    if !args.json {
        eprintln!("Simulating scan from {}...", args.scenario);
        eprintln!(
            "  Cadence: {} ms, idle timeout: {} ms, fallback: {}",
            config.sample_interval_ms,
            config.idle_timeout_ms.unwrap_or_default(),
            if config.allow_fallback { "on" } else { "off" }
        );
    }

    let camera = Arc::new(SimulatedCamera::from_scenario(scenario));
    let session = ScanSession::new(config, camera.clone(), Arc::new(EmbeddedTextDecoder::new()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.set_event_callback(move |event| {
        let _ = tx.send(event);
    });
    session.start();

    while let Some(event) = rx.recv().await {
        if let ScanEvent::StateChanged { state, .. } = event {
            if !args.json {
                println!("state: {}", state_label(state));
            }
            if matches!(state, ScanState::Stopped | ScanState::Failed) {
                break;
            }
        }
    }

    let snapshot = session.snapshot();
    session.dispose();
    log::debug!("Simulated camera has {} open streams", camera.open_streams());

    let batch = snapshot
        .result
        .as_ref()
        .and_then(|payload| BatchReference::from_payload(payload).ok());
    let exit_code = exit_code_for(&snapshot);

    if args.json {
        let out = SimulateOutput { snapshot, batch };
        if !output::emit_json(&out, args.compact, args.output.as_deref()) {
            return exit_codes::EXECUTION_ERROR;
        }
        return exit_code;
    }

    if snapshot.stats.fallback_grants > 0 {
        println!("Preferred camera unavailable, used fallback camera");
    }
    match (&snapshot.result, &snapshot.last_error) {
        (Some(payload), _) => {
            println!("Decoded: {}", payload);
            match &batch {
                Some(batch) => println!("Batch: {}", batch),
                None => println!("Batch: payload is not a batch reference"),
            }
        }
        (None, Some(error)) => {
            eprintln!("Scan failed ({}): {}", error.kind(), error.user_message());
        }
        (None, None) => {
            println!(
                "Stopped without a result ({})",
                termination_label(snapshot.termination)
            );
        }
    }
    println!(
        "Frames sampled: {}, skipped busy: {}, skipped not ready: {}",
        snapshot.stats.frames_sampled, snapshot.stats.skipped_busy, snapshot.stats.skipped_not_ready
    );

    exit_code
}

fn build_config(args: &SimulateArgs) -> Result<ScanConfig, ConfigError> {
    let mut config = ScanConfig::from_env()?;
    if let Some(interval) = args.interval_ms {
        config.sample_interval_ms = interval;
    }
    if let Some(timeout) = args.idle_timeout_ms {
        config.idle_timeout_ms = Some(timeout);
    }
    if config.idle_timeout_ms.is_none() {
        config.idle_timeout_ms = Some(DEFAULT_IDLE_TIMEOUT_MS);
    }
    if args.no_fallback {
        config.allow_fallback = false;
    }
    config.validate()?;
    Ok(config)
}

fn exit_code_for(snapshot: &SessionSnapshot) -> i32 {
    match snapshot.termination {
        Some(Termination::Decoded) => exit_codes::SUCCESS,
        Some(Termination::Failed) => exit_codes::SCAN_FAILED,
        _ => exit_codes::NO_RESULT,
    }
}

fn state_label(state: ScanState) -> &'static str {
    match state {
        ScanState::Idle => "idle",
        ScanState::RequestingPermission => "requesting_permission",
        ScanState::Streaming => "streaming",
        ScanState::Stopped => "stopped",
        ScanState::Failed => "failed",
    }
}

fn termination_label(termination: Option<Termination>) -> &'static str {
    match termination {
        Some(Termination::Decoded) => "decoded",
        Some(Termination::Cancelled) => "cancelled",
        Some(Termination::Preempted) => "preempted",
        Some(Termination::TimedOut) => "timed out",
        Some(Termination::Failed) => "failed",
        None => "not started",
    }
}
