mod common;

use abox_engine::{
    Error,
    compr::{StreamState, Trigger},
    message::{Command, Event, EventCode},
};
use common::{WAIT, created};
use std::{thread, time::Duration};

fn settle() {
    thread::sleep(Duration::from_millis(30));
}

#[test]
fn drain_before_start_is_rejected_without_eos() {
    let rig = created();
    assert!(matches!(
        rig.device.trigger(Trigger::Drain),
        Err(Error::InvalidState(_))
    ));
    assert!(!rig.sim.commands().contains(&Command::Eos));
    assert_eq!(rig.notes.counts().drains, 0);
}

#[test]
fn eos_completion_fires_exactly_one_drain() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.device.ack(0x1000).unwrap();
    assert!(rig.sim.decode(0x1000));

    rig.device.trigger(Trigger::Drain).unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 1));
    assert_eq!(rig.device.state(), StreamState::Created);

    // a second EOS with nothing pending is spurious
    rig.sim.raise(Event::ok(EventCode::Eos));
    assert!(rig.sim.wait_irq_handled(WAIT));
    settle();
    assert_eq!(rig.notes.counts().drains, 1);
}

#[test]
fn drain_with_undecoded_data_still_completes() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.device.ack(0x1000).unwrap();

    rig.device.trigger(Trigger::Drain).unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 1));
    let tracker = rig.device.tracker().unwrap();
    assert_ne!(tracker.copied_total(), tracker.received_total());
}

#[test]
fn partial_drain_keeps_stream_running() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.device.trigger(Trigger::PartialDrain).unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 1));
    assert_eq!(rig.device.state(), StreamState::Started);

    rig.device.trigger(Trigger::NextTrack).unwrap();
    rig.device.trigger(Trigger::Drain).unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 2));
}

#[test]
fn stop_with_pending_drain_reports_it_once() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.sim.set_complete(false);
    rig.device.trigger(Trigger::Drain).unwrap();
    assert_eq!(rig.device.state(), StreamState::Draining);

    rig.sim.set_complete(true);
    rig.device.trigger(Trigger::Stop).unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 1));

    // late EOS from firmware does not report again
    rig.sim.raise(Event::ok(EventCode::Eos));
    assert!(rig.sim.wait_irq_handled(WAIT));
    settle();
    assert_eq!(rig.notes.counts().drains, 1);
}

#[test]
fn free_with_pending_drain_reports_it() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.sim.set_complete(false);
    rig.device.trigger(Trigger::Drain).unwrap();

    rig.sim.set_complete(true);
    rig.device.free().unwrap();
    assert!(rig.notes.wait_for(WAIT, |c| c.drains == 1));
    assert_eq!(rig.device.state(), StreamState::Closed);
}

#[test]
fn failed_eos_send_rolls_back_drain() {
    let rig = created();
    rig.device.trigger(Trigger::Start).unwrap();
    rig.sim.set_ack(false);
    rig.sim.set_complete(false);
    assert!(rig.device.trigger(Trigger::Drain).unwrap_err().is_timeout());
    rig.sim.set_ack(true);
    rig.sim.set_complete(true);

    assert_eq!(rig.device.state(), StreamState::Started);
    rig.device.trigger(Trigger::Stop).unwrap();
    settle();
    assert_eq!(rig.notes.counts().drains, 0);
}
