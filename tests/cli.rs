use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tone_pipeline"))
}

#[test]
fn check_prints_resolved_config() {
    let output = cli()
        .args(["check", "--frequency", "440", "--slots", "4"])
        .output()
        .expect("failed to run tone_pipeline check");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("config JSON payload");
    assert_eq!(json["tone"]["frequency"], 440);
    assert_eq!(json["tone"]["amplitude"], 10000);
    assert_eq!(json["buffers"]["slot_count"], 4);
    assert_eq!(json["format"]["sample_rate"], 48000);
}

#[test]
fn check_rejects_slots_not_above_capacity() {
    let output = cli()
        .args(["check", "--slots", "2", "--capacity", "2"])
        .output()
        .expect("failed to run tone_pipeline check");
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("must exceed channel_capacity"),
        "expected validation error in stderr, got {stderr}"
    );
}

#[test]
fn check_reads_config_file() {
    let path = std::env::temp_dir().join(format!("tone_pipeline_cli_{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "format": { "channel_count": 2 } }"#).unwrap();

    let output = cli()
        .args(["check", "--config"])
        .arg(&path)
        .output()
        .expect("failed to run tone_pipeline check");
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("config JSON payload");
    assert_eq!(json["format"]["channel_count"], 2);
    assert_eq!(json["buffers"]["samples_per_slot"], 256);
}

#[test]
fn run_with_invalid_config_fails() {
    let output = cli()
        .args(["run", "--frequency", "30000"])
        .output()
        .expect("failed to run tone_pipeline run");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_wav_requires_output_path() {
    let output = cli()
        .args(["run", "--sink", "wav"])
        .output()
        .expect("failed to run tone_pipeline run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("--output"), "got {stderr}");
}
