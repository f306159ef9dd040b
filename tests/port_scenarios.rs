//! Port lifecycle integration tests.
//!
//! Exercises the send/complete path, the transit drain gate, format
//! commit discipline and the connection preconditions with mock modules.

mod common;

use common::{collector, MockModule};
use mediahub::{
    BufferHeader, Component, CoreStatisticsParam, Error, EsFormat, Parameter, StatsDir,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// =============================================================================
// Send / complete
// =============================================================================

#[test]
fn simple_send_and_complete() {
    let module = MockModule::new();
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, seen) = collector();
    port.enable(Some(callback)).unwrap();

    for i in 0..4u8 {
        port.send_buffer(BufferHeader::with_data(vec![i; 64])).unwrap();
    }
    assert_eq!(module.held(), 4);
    assert_eq!(port.buffers_in_transit(), 4);

    module.complete_all();
    assert_eq!(seen.count(), 4);
    assert_eq!(port.buffers_in_transit(), 0);

    let mut param = Parameter::CoreStatistics(CoreStatisticsParam::new(StatsDir::Rx, false));
    port.parameter_get(&mut param).unwrap();
    let Parameter::CoreStatistics(rx) = param else {
        panic!("parameter changed shape");
    };
    assert_eq!(rx.stats.buffer_count, 4);
    assert!(rx.stats.first_buffer_time > 0);

    let mut param = Parameter::CoreStatistics(CoreStatisticsParam::new(StatsDir::Tx, false));
    port.parameter_get(&mut param).unwrap();
    let Parameter::CoreStatistics(tx) = param else {
        panic!("parameter changed shape");
    };
    assert_eq!(tx.stats.buffer_count, 4);
}

#[test]
fn statistics_reset_zeroes_one_direction() {
    let module = MockModule::new();
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, _seen) = collector();
    port.enable(Some(callback)).unwrap();
    port.send_buffer(BufferHeader::with_data(vec![0; 16])).unwrap();
    module.complete_all();

    let mut param = Parameter::CoreStatistics(CoreStatisticsParam::new(StatsDir::Rx, true));
    port.parameter_get(&mut param).unwrap();
    let Parameter::CoreStatistics(rx) = param else {
        panic!("parameter changed shape");
    };
    assert_eq!(rx.stats.buffer_count, 1);

    // RX was zeroed by the reset, TX was not.
    let mut param = Parameter::CoreStatistics(CoreStatisticsParam::new(StatsDir::Rx, false));
    port.parameter_get(&mut param).unwrap();
    let Parameter::CoreStatistics(rx) = param else {
        panic!("parameter changed shape");
    };
    assert_eq!(rx.stats.buffer_count, 0);

    let mut param = Parameter::CoreStatistics(CoreStatisticsParam::new(StatsDir::Tx, false));
    port.parameter_get(&mut param).unwrap();
    let Parameter::CoreStatistics(tx) = param else {
        panic!("parameter changed shape");
    };
    assert_eq!(tx.stats.buffer_count, 1);
}

// =============================================================================
// Disable drains transit
// =============================================================================

#[test]
fn disable_blocks_until_transit_drains() {
    let module = MockModule::new();
    module.set_drain_on_disable(false);
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, seen) = collector();
    port.enable(Some(callback)).unwrap();

    for _ in 0..4 {
        port.send_buffer(BufferHeader::with_data(vec![0; 16])).unwrap();
    }
    module.complete_one();
    module.complete_one();
    assert_eq!(port.buffers_in_transit(), 2);

    let disabled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&disabled);
    let blocked_port = Arc::clone(port);
    let blocker = thread::spawn(move || {
        blocked_port.disable().unwrap();
        flag.store(true, Ordering::SeqCst);
    });

    // Give disable time to reach the drain gate; it must still be blocked
    // on the two outstanding buffers.
    thread::sleep(Duration::from_millis(100));
    assert!(!disabled.load(Ordering::SeqCst));
    assert_eq!(port.buffers_in_transit(), 2);

    module.complete_one();
    module.complete_one();
    blocker.join().unwrap();

    assert!(disabled.load(Ordering::SeqCst));
    assert!(!port.is_enabled());
    assert_eq!(port.buffers_in_transit(), 0);
    assert_eq!(seen.count(), 4);
}

#[test]
fn failed_module_disable_leaves_port_usable() {
    let module = MockModule::new();
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, _seen) = collector();
    port.enable(Some(callback)).unwrap();

    module.set_fail_disable(true);
    assert_eq!(port.disable(), Err(Error::OutOfResources));
    assert!(port.is_enabled());

    // The port still accepts buffers.
    port.send_buffer(BufferHeader::with_data(vec![0; 8])).unwrap();
    module.complete_all();

    module.set_fail_disable(false);
    port.disable().unwrap();
    assert!(!port.is_enabled());
}

#[test]
fn failed_module_enable_reports_and_stays_disabled() {
    let module = MockModule::new();
    module.set_fail_enable(true);
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, _seen) = collector();
    assert_eq!(port.enable(Some(callback)), Err(Error::OutOfResources));
    assert!(!port.is_enabled());
}

// =============================================================================
// Format commit
// =============================================================================

#[test]
fn format_commit_clamps_sibling_outputs() {
    let input_module = MockModule::new();
    let component = Component::builder("video_decode")
        .input(Box::new(input_module))
        .output(Box::new(MockModule::new()))
        .output(Box::new(MockModule::new()))
        .build();

    let input = component.input(0).unwrap();
    input.set_buffer_num_min(2);
    input.set_buffer_size_min(512);
    for output in component.outputs() {
        output.set_buffer_num_min(3);
        output.set_buffer_size_min(4096);
    }

    input.format_commit().unwrap();

    assert!(input.buffer_num() >= input.buffer_num_min());
    assert!(input.buffer_size() >= input.buffer_size_min());
    for output in component.outputs() {
        assert!(output.buffer_num() >= output.buffer_num_min());
        assert!(output.buffer_size() >= output.buffer_size_min());
    }
}

#[test]
fn format_handle_overwrite_is_detected_and_repaired() {
    let module = MockModule::new();
    let component = Component::builder("video_decode").input(Box::new(module)).build();
    let port = component.input(0).unwrap();

    let canonical = port.format();
    port.replace_format_handle(EsFormat::new().into_ref());

    assert_eq!(port.format_commit(), Err(Error::FormatOverwritten));
    assert!(Arc::ptr_eq(&port.format(), &canonical));

    // Repaired: the next commit reaches the module.
    port.format_commit().unwrap();
}

// =============================================================================
// Connection preconditions
// =============================================================================

#[test]
fn double_connect_is_rejected() {
    let a = Component::builder("a").input(Box::new(MockModule::new())).build();
    let b = Component::builder("b").output(Box::new(MockModule::new())).build();
    let c = Component::builder("c").output(Box::new(MockModule::new())).build();
    let d = Component::builder("d").output(Box::new(MockModule::new())).build();

    let a_in = a.input(0).unwrap();
    a_in.connect(b.output(0).unwrap()).unwrap();

    assert_eq!(a_in.connect(c.output(0).unwrap()), Err(Error::AlreadyConnected));
    assert_eq!(
        d.output(0).unwrap().connect(a_in),
        Err(Error::AlreadyConnected)
    );

    // The original pairing is untouched.
    assert!(Arc::ptr_eq(&a_in.connected_port().unwrap(), b.output(0).unwrap()));
}

#[test]
fn connect_while_enabled_is_rejected() {
    let a = Component::builder("a").input(Box::new(MockModule::new())).build();
    let b = Component::builder("b").output(Box::new(MockModule::new())).build();

    let a_in = a.input(0).unwrap();
    let (callback, _seen) = collector();
    a_in.enable(Some(callback)).unwrap();

    assert_eq!(a_in.connect(b.output(0).unwrap()), Err(Error::InvalidArgument));
    assert!(!a_in.is_connected());
}

#[test]
fn wrong_port_type_combinations_are_rejected() {
    let a = Component::builder("a").input(Box::new(MockModule::new())).build();
    let b = Component::builder("b").input(Box::new(MockModule::new())).build();

    assert_eq!(
        a.input(0).unwrap().connect(b.input(0).unwrap()),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        a.control().connect(b.input(0).unwrap()),
        Err(Error::InvalidArgument)
    );
}

// =============================================================================
// Flush
// =============================================================================

#[test]
fn flush_returns_held_buffers() {
    let module = MockModule::new();
    let component = Component::builder("camera").output(Box::new(module.clone())).build();
    let port = component.output(0).unwrap();

    let (callback, seen) = collector();
    port.enable(Some(callback)).unwrap();

    port.send_buffer(BufferHeader::with_data(vec![0; 16])).unwrap();
    port.send_buffer(BufferHeader::with_data(vec![0; 16])).unwrap();

    port.flush().unwrap();
    assert_eq!(module.held(), 0);
    assert_eq!(seen.count(), 2);
    assert_eq!(port.buffers_in_transit(), 0);

    port.disable().unwrap();
}
