use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_acoustic_atlas"))
}

fn write_voice(path: &Path, f0: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for i in 0..9_600 {
        let t = i as f32 / 16_000.0;
        let s: f32 = (1..=5)
            .map(|h| 0.2 * (2.0 * PI * f0 * h as f32 * t).sin() / h as f32)
            .sum();
        writer
            .write_sample((s * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn extract_writes_table_report_and_projector_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = dir.path().join("corpus");
    fs::create_dir(&corpus).expect("corpus dir");
    write_voice(&corpus.join("spk01_a.wav"), 120.0);
    write_voice(&corpus.join("spk02_b.wav"), 210.0);
    fs::write(corpus.join("index.txt"), "sidecar").expect("sidecar");

    let table = dir.path().join("features.tsv");
    let report = dir.path().join("report.json");
    let projector = dir.path().join("projector");
    let output = cli()
        .arg("extract")
        .arg(&corpus)
        .args(["--features", "lpcc,spectral", "--fields", "speaker,take"])
        .args(["--delimiter", "\t", "--workers", "2"])
        .arg("--output")
        .arg(&table)
        .arg("--report")
        .arg(&report)
        .arg("--projector-dir")
        .arg(&projector)
        .output()
        .expect("failed to run acoustic_atlas extract");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let text = fs::read_to_string(&table).expect("table written");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("file\tpath\tspeaker\ttake\tlpcc_01_mean"));
    assert!(lines[0].ends_with("\tselection"));
    assert!(lines[1].starts_with("spk01_a.wav\t"));

    let json: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report written"))
            .expect("report JSON");
    assert_eq!(json["rows"], 2);
    assert_eq!(json["skipped_non_audio"].as_array().map(Vec::len), Some(1));

    let tensors = fs::read_to_string(projector.join("tensors.tsv")).expect("tensors");
    assert_eq!(tensors.lines().count(), 2);
    let metadata = fs::read_to_string(projector.join("metadata.tsv")).expect("metadata");
    assert_eq!(
        metadata.lines().next(),
        Some("file\tpath\tspeaker\ttake\tselection")
    );
}

#[test]
fn extract_to_stdout_without_selection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("take1.wav");
    write_voice(&file, 180.0);

    let output = cli()
        .arg("extract")
        .arg(&file)
        .args(["--features", "lpcc", "--no-selection"])
        .output()
        .expect("failed to run acoustic_atlas extract");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let header = stdout.lines().next().expect("header line");
    assert!(header.starts_with("file,path,lpcc_01_mean"));
    assert!(!header.contains("selection"));
    assert_eq!(stdout.lines().count(), 2);
}

#[test]
fn extract_fails_on_schema_mismatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_voice(&dir.path().join("spk01_a.wav"), 120.0);
    write_voice(&dir.path().join("spk02.wav"), 120.0);

    let output = cli()
        .arg("extract")
        .arg(dir.path())
        .args(["--features", "lpcc", "--fields", "speaker,take"])
        .output()
        .expect("failed to run acoustic_atlas extract");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("spk02.wav"),
        "expected offending file in stderr, got {stderr}"
    );
}

#[test]
fn extract_rejects_unknown_config_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_voice(&dir.path().join("a.wav"), 120.0);
    let config = dir.path().join("atlas.json");
    fs::write(&config, r#"{"features": [{"family": "lpcc", "params": {"order": 10}}]}"#)
        .expect("config");

    let output = cli()
        .arg("extract")
        .arg(dir.path().join("a.wav"))
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run acoustic_atlas extract");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("order"), "got {stderr}");
}

#[test]
fn exclusions_are_logged_even_when_export_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = dir.path().join("corpus");
    fs::create_dir(&corpus).expect("corpus dir");
    write_voice(&corpus.join("a.wav"), 120.0);
    write_voice(&corpus.join("b.wav"), 200.0);
    // RIFF/WAVE signature with no usable chunks
    let mut broken = b"RIFF".to_vec();
    broken.extend_from_slice(&1_000u32.to_le_bytes());
    broken.extend_from_slice(b"WAVEjunk");
    broken.extend_from_slice(&64u32.to_le_bytes());
    broken.extend_from_slice(&[0u8; 8]);
    fs::write(corpus.join("broken.wav"), broken).expect("broken wav");
    // a plain file where the projector directory should go
    let blocker = dir.path().join("projector");
    fs::write(&blocker, "not a directory").expect("blocker");

    let output = cli()
        .env_remove("RUST_LOG")
        .arg("extract")
        .arg(&corpus)
        .args(["--features", "lpcc"])
        .arg("--output")
        .arg(dir.path().join("features.csv"))
        .arg("--projector-dir")
        .arg(&blocker)
        .output()
        .expect("failed to run acoustic_atlas extract");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("[Report] Excluded") && stderr.contains("broken.wav"),
        "expected exclusion summary in stderr, got {stderr}"
    );
    assert!(stderr.contains("exporting projector files"), "got {stderr}");
}

#[test]
fn inspect_filename_realigns_fields() {
    let output = cli()
        .args([
            "inspect-filename",
            "spk012_f_read_03.wav",
            "--fields",
            "speaker,gender",
        ])
        .output()
        .expect("failed to run inspect-filename");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.contains("tokens (4):"));
    assert!(stdout.contains("--fields speaker,gender,field_3,field_4"));
}

#[test]
fn families_lists_every_default() {
    let output = cli()
        .arg("families")
        .output()
        .expect("failed to run families");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("families JSON");
    let families: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|spec| spec["family"].as_str())
        .collect();
    assert_eq!(families, vec!["mel", "prosody", "spectral", "lpcc", "speaker"]);
    assert_eq!(json[0]["params"]["num_mfcc"], 13);
}
