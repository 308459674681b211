// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Federation save/restore round trips and sidecar verification over the
//! in-process bus.

use hfed::exec::ExecutionMode;
use hfed::rti::intraprocess::IntraProcessBus;
use hfed::{Error, ExecutionControl, FederateConfig, KnownFederate};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;

fn pair_config(name: &str, master: bool) -> FederateConfig {
    FederateConfig::builder("fed_exec", name, "sim")
        .preset_master(master)
        .known_federate(KnownFederate::required("fed_a", "sim"))
        .known_federate(KnownFederate::required("fed_b", "sim"))
        .build()
        .unwrap()
}

fn initialize(control: &mut ExecutionControl) {
    control.join().unwrap();
    control.pre_multiphase_init().unwrap();
    control.multiphase_init().unwrap();
    control.post_multiphase_init().unwrap();
}

#[test]
fn save_and_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let bus = IntraProcessBus::new();
    let mut federates = Vec::new();
    for (name, master) in [("fed_a", true), ("fed_b", false)] {
        let rti = bus.new_connection();
        let dir: PathBuf = dir.path().to_path_buf();
        federates.push(thread::spawn(move || {
            let mut control = ExecutionControl::new(pair_config(name, master), rti).unwrap();
            initialize(&mut control);
            let mut saved = false;
            let mut restored = false;
            loop {
                let mode = control.end_of_frame().unwrap();
                if mode == ExecutionMode::Shutdown {
                    break;
                }
                // Both federates checkpoint at frame 3 and restore at
                // frame 5; whichever requests first, the other joins the
                // same federation-wide operation.
                if !saved && control.frame() >= 3 {
                    control.save_checkpoint("ckpt_1", &dir).unwrap();
                    saved = true;
                }
                if saved && !restored && control.frame() >= 5 {
                    control.restore_checkpoint("ckpt_1", &dir).unwrap();
                    restored = true;
                }
                if control.is_master() && restored && control.frame() >= 8 {
                    control.request_shutdown().unwrap();
                }
            }
            control.shutdown().unwrap();
            (saved, restored)
        }));
    }
    for federate in federates {
        let (saved, restored) = federate.join().unwrap();
        assert!(saved && restored);
    }
    assert!(dir.path().join("ckpt_1.running_feds").exists());
}

#[test]
fn restore_refuses_a_drifted_roster() {
    let dir = tempfile::tempdir().unwrap();
    let bus = IntraProcessBus::new();
    let rti = bus.new_connection();
    let config = FederateConfig::builder("fed_exec", "fed_a", "sim")
        .preset_master(true)
        .known_federate(KnownFederate::required("fed_a", "sim"))
        .build()
        .unwrap();
    let mut control = ExecutionControl::new(config, rti).unwrap();
    initialize(&mut control);
    for _ in 0..3 {
        control.end_of_frame().unwrap();
    }
    control.save_checkpoint("ckpt_bad", dir.path()).unwrap();

    // A federate that was never part of the run appears in the sidecar.
    let sidecar = dir.path().join("ckpt_bad.running_feds");
    let mut file = OpenOptions::new().append(true).open(&sidecar).unwrap();
    writeln!(file, "fed_ghost\tsim\t1").unwrap();

    let err = control.restore_checkpoint("ckpt_bad", dir.path()).unwrap_err();
    assert!(matches!(err, Error::RestoreMismatch(_)));

    control.request_shutdown().unwrap();
    loop {
        if control.end_of_frame().unwrap() == ExecutionMode::Shutdown {
            break;
        }
    }
    control.shutdown().unwrap();
}
