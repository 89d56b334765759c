use std::io::Write;
use std::process::Command;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::tempdir;

use oxipatch::patch::{offt, PatchHeader};

fn bin() -> String {
    env!("CARGO_BIN_EXE_oxipatch").to_string()
}

fn bz(data: &[u8]) -> Vec<u8> {
    let mut enc = BzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Single add-triple patch rewriting `old` into `target`.
fn literal_patch(old: &[u8], target: &[u8]) -> Vec<u8> {
    let mut ctrl = Vec::new();
    ctrl.extend_from_slice(&offt::encode(target.len() as i64));
    ctrl.extend_from_slice(&offt::encode(0));
    ctrl.extend_from_slice(&offt::encode(0));
    let diff: Vec<u8> = target
        .iter()
        .enumerate()
        .map(|(i, &t)| t.wrapping_sub(old.get(i).copied().unwrap_or(0)))
        .collect();
    let (ctrl, diff, extra) = (bz(&ctrl), bz(&diff), bz(b""));
    let header = PatchHeader {
        ctrl_len: ctrl.len() as i64,
        diff_len: diff.len() as i64,
        new_size: target.len() as i64,
    };
    let mut out = Vec::new();
    header.write_to(&mut out).unwrap();
    out.extend_from_slice(&ctrl);
    out.extend_from_slice(&diff);
    out.extend_from_slice(&extra);
    out
}

#[test]
fn cli_apply_reconstructs_target() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("delta.patch");
    let output = dir.path().join("output.bin");

    let old = b"abcde12345abcde12345";
    let target = b"abcdeXXXXXabcde12345!";
    std::fs::write(&source, old).unwrap();
    std::fs::write(&patch, literal_patch(old, target)).unwrap();

    let st = Command::new(bin())
        .arg("apply")
        .arg(&source)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), target);
}

#[test]
fn cli_refuses_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("delta.patch");
    let output = dir.path().join("output.bin");

    std::fs::write(&source, b"aaa").unwrap();
    std::fs::write(&patch, literal_patch(b"aaa", b"bbb")).unwrap();
    std::fs::write(&output, b"precious").unwrap();

    let st = Command::new(bin())
        .arg("apply")
        .arg(&source)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"precious");

    let st = Command::new(bin())
        .arg("--force")
        .arg("apply")
        .arg(&source)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"bbb");
}

#[test]
fn cli_bad_magic_exits_with_format_code() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("delta.patch");
    let output = dir.path().join("output.bin");

    std::fs::write(&source, b"aaa").unwrap();
    let mut bad = literal_patch(b"aaa", b"bbb");
    bad[0] = b'X';
    std::fs::write(&patch, bad).unwrap();

    let st = Command::new(bin())
        .arg("apply")
        .arg(&source)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));
}

#[test]
fn cli_info_prints_header_fields() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("delta.patch");
    std::fs::write(&patch, literal_patch(b"old content", b"new content")).unwrap();

    let out = Command::new(bin()).arg("info").arg(&patch).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("target size:"));
    assert!(stdout.contains("11"), "target size 11 missing: {stdout}");
}

#[test]
fn cli_json_stats_on_apply() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("delta.patch");
    let output = dir.path().join("output.bin");

    std::fs::write(&source, b"json source").unwrap();
    std::fs::write(&patch, literal_patch(b"json source", b"json target")).unwrap();

    let out = Command::new(bin())
        .args(["--json", "apply"])
        .arg(&source)
        .arg(&patch)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("\"command\": \"apply\""), "stderr: {stderr}");
    assert!(stderr.contains("\"output_size\": 11"), "stderr: {stderr}");
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
}
