// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn stm32_mcu() -> Command {
    Command::cargo_bin("stm32-mcu").unwrap()
}

#[test]
fn test_parts_lists_presets() {
    stm32_mcu()
        .arg("parts")
        .assert()
        .success()
        .stdout(predicate::str::contains("stm32f407vg"))
        .stdout(predicate::str::contains("stm32l152re"));
}

#[test]
fn test_default_part_summary() {
    stm32_mcu()
        .assert()
        .success()
        .stdout(predicate::str::contains("Part: stm32f103rb"))
        .stdout(predicate::str::contains("/machine/mcu/stm32/rcc"))
        .stdout(predicate::str::contains("mem-flash-alias"));
}

#[test]
fn test_f4_part_has_six_serial_ports() {
    stm32_mcu()
        .args(["--part", "stm32f407vg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/machine/mcu/stm32/usart[6]"))
        .stdout(predicate::str::contains("/machine/mcu/stm32/gpio[e]"))
        .stdout(predicate::str::contains("gpio[f]").not());
}

#[test]
fn test_json_snapshot_parses() {
    let output = stm32_mcu()
        .args(["--part", "stm32f303vc", "--hse-freq-hz", "8000000", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["part"], "stm32f303vc");
    assert_eq!(json["hse_freq_hz"], 8_000_000);
    assert!(json["devices"]["/machine/mcu/stm32/usart[5]"].is_object());
    assert!(json["devices"]
        .as_object()
        .unwrap()
        .keys()
        .all(|k| !k.contains("usart[6]")));
}

#[test]
fn test_unknown_part_is_config_error() {
    stm32_mcu()
        .args(["--part", "stm32h743zi"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown part"));
}

#[test]
fn test_chip_conflicts_with_part() {
    stm32_mcu()
        .args(["--chip", "chip.yaml", "--part", "stm32f407vg"])
        .assert()
        .failure();
}

#[test]
fn test_missing_board_is_config_error() {
    stm32_mcu()
        .args(["--board", "does/not/exist.yaml"])
        .assert()
        .code(2);
}

#[test]
fn test_board_file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let board = dir.path().join("board.yaml");
    fs::write(
        &board,
        r#"
name: "nucleo-l152re"
part: "stm32l152re"
hse_freq_hz: 8000000
lse_freq_hz: 32768
serial:
  usart2:
    backend: file
    path: "console.log"
"#,
    )
    .unwrap();

    stm32_mcu()
        .arg("--board")
        .arg(&board)
        .assert()
        .success()
        .stdout(predicate::str::contains("Part: stm32l152re (STM32 L1)"))
        .stdout(predicate::str::contains("HSE 8000000 Hz"));
    assert!(dir.path().join("console.log").exists());
}

#[test]
fn test_firmware_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    let fw = dir.path().join("fw.bin");
    fs::write(&fw, [0x00, 0x50, 0x00, 0x20, 0x09, 0x00, 0x00, 0x08]).unwrap();

    stm32_mcu()
        .arg("--firmware")
        .arg(&fw)
        .args(["--resets", "3"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded 8 bytes"));
}

#[test]
fn test_oversized_firmware_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let fw = dir.path().join("big.bin");
    // stm32f103rb has 128 KiB of flash.
    fs::write(&fw, vec![0xFFu8; 200 * 1024]).unwrap();

    stm32_mcu()
        .arg("--firmware")
        .arg(&fw)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not fit"));
}
