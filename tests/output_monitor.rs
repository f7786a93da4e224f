use std::sync::Arc;

use localrun::exec::OutputSink;
use localrun::monitor::{Discovery, DiscoveryTarget, OutputMonitor};
use localrun::types::OutputStream;
use localrun_test_utils::builders::{ras_line, run_id_line, shutdown_line};
use localrun_test_utils::init_tracing;

fn drain(rx: &mut tokio::sync::mpsc::Receiver<Discovery>) -> Vec<Discovery> {
    let mut out = Vec::new();
    while let Ok(d) = rx.try_recv() {
        out.push(d);
    }
    out
}

#[test]
fn test_run_id_is_notified_on_every_matching_write() {
    init_tracing();
    let (monitor, mut rx) = OutputMonitor::new(10);

    let line = format!("{}\n", run_id_line("U525"));
    monitor.write(line.as_bytes()).unwrap();
    monitor.write(b"unrelated trace output\n").unwrap();
    monitor.write(line.as_bytes()).unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("U525"));
    assert_eq!(
        drain(&mut rx),
        vec![
            Discovery::RunIdAllocated("U525".into()),
            Discovery::RunIdAllocated("U525".into()),
        ]
    );
}

#[test]
fn test_one_write_with_every_template_gives_one_notification() {
    let (monitor, mut rx) = OutputMonitor::new(10);

    let chunk = format!(
        "{}\n{}\n{}\n",
        run_id_line("L9"),
        ras_line("file:///tmp/ras"),
        shutdown_line()
    );
    monitor.write(chunk.as_bytes()).unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("L9"));
    assert_eq!(monitor.ras_location().as_deref(), Some("file:///tmp/ras"));
    assert!(monitor.shutdown_observed());
    assert_eq!(drain(&mut rx), vec![Discovery::RunIdAllocated("L9".into())]);
}

#[test]
fn test_new_discovery_wins_over_a_repeated_one() {
    let (monitor, mut rx) = OutputMonitor::new(10);

    monitor.write(format!("{}\n", run_id_line("L9")).as_bytes()).unwrap();
    let chunk = format!("{}\n{}\n", run_id_line("L9"), ras_line("file:///tmp/ras"));
    monitor.write(chunk.as_bytes()).unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            Discovery::RunIdAllocated("L9".into()),
            Discovery::RasLocationFound("file:///tmp/ras".into()),
        ]
    );
}

#[test]
fn test_write_reports_full_chunk_length() {
    let (monitor, _rx) = OutputMonitor::new(10);
    let chunk = b"some unrelated trace output\n";
    assert_eq!(monitor.write(chunk).unwrap(), chunk.len());
    assert_eq!(monitor.collected_output(), chunk.to_vec());
}

#[test]
fn test_ras_location_is_detected() {
    init_tracing();
    let (monitor, mut rx) = OutputMonitor::new(10);

    let location = "file:///Users/tester/.galasa/ras";
    monitor.write(format!("{}\n", ras_line(location)).as_bytes()).unwrap();

    assert_eq!(monitor.ras_location().as_deref(), Some(location));
    assert_eq!(
        monitor.discovered(DiscoveryTarget::RasLocation).as_deref(),
        Some(location)
    );
    assert_eq!(drain(&mut rx), vec![Discovery::RasLocationFound(location.into())]);
}

#[test]
fn test_coordinates_need_both_values() {
    let (monitor, _rx) = OutputMonitor::new(10);
    assert!(monitor.coordinates().is_none());

    monitor.write(format!("{}\n", run_id_line("L0")).as_bytes()).unwrap();
    assert!(monitor.coordinates().is_none());

    monitor.write(format!("{}\n", ras_line("file:///tmp/ras")).as_bytes()).unwrap();
    assert_eq!(
        monitor.coordinates(),
        Some(("file:///tmp/ras".to_string(), "L0".to_string()))
    );
}

#[test]
fn test_shutdown_marker_is_recorded() {
    let (monitor, mut rx) = OutputMonitor::new(10);
    assert!(!monitor.shutdown_observed());

    monitor.write(format!("{}\n", shutdown_line()).as_bytes()).unwrap();
    monitor.write(format!("{}\n", shutdown_line()).as_bytes()).unwrap();

    assert!(monitor.shutdown_observed());
    assert_eq!(
        drain(&mut rx),
        vec![Discovery::ShutdownObserved, Discovery::ShutdownObserved]
    );
}

#[test]
fn test_template_split_across_writes_is_found() {
    let (monitor, mut rx) = OutputMonitor::new(10);

    monitor.write(b"12:19:11.990 INFO  d.g.f.FrameworkInitialisation - Allocated Run ").unwrap();
    assert!(monitor.run_id().is_none());
    monitor.write(b"Name L7 to this run\n").unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("L7"));
    assert_eq!(drain(&mut rx), vec![Discovery::RunIdAllocated("L7".into())]);
}

#[test]
fn test_unfinished_template_is_not_counted_twice() {
    let (monitor, mut rx) = OutputMonitor::new(10);

    monitor.write(format!("{} and then", run_id_line("L7")).as_bytes()).unwrap();
    monitor.write(b" some more of the same line\n").unwrap();

    assert_eq!(drain(&mut rx), vec![Discovery::RunIdAllocated("L7".into())]);
}

#[test]
fn test_character_split_across_writes_is_decoded() {
    init_tracing();
    let (monitor, mut rx) = OutputMonitor::new(10);

    let location = "file:///home/josé/.galasa/ras";
    let line = format!("{}\n", ras_line(location));
    let bytes = line.as_bytes();
    let e_acute = line.find('é').unwrap();
    // Cut between the two bytes of the character.
    let (first, second) = bytes.split_at(e_acute + 1);

    monitor.write(first).unwrap();
    assert!(monitor.ras_location().is_none());
    monitor.write(second).unwrap();

    assert_eq!(monitor.ras_location().as_deref(), Some(location));
    assert_eq!(drain(&mut rx), vec![Discovery::RasLocationFound(location.into())]);
    assert_eq!(monitor.output_text(), line);
}

#[test]
fn test_character_split_on_stderr_is_decoded() {
    let (monitor, _rx) = OutputMonitor::new(10);

    let location = "file:///home/josé/.galasa/ras";
    let line = format!("{}\n", ras_line(location));
    let bytes = line.as_bytes();
    let cut = line.find('é').unwrap() + 1;

    monitor.write_from(OutputStream::Stderr, &bytes[..cut]).unwrap();
    // A write on the other stream must not disturb the cut character.
    monitor.write_from(OutputStream::Stdout, b"other stream\n").unwrap();
    monitor.write_from(OutputStream::Stderr, &bytes[cut..]).unwrap();

    assert_eq!(monitor.ras_location().as_deref(), Some(location));
}

#[test]
fn test_invalid_bytes_do_not_hide_a_template() {
    let (monitor, _rx) = OutputMonitor::new(10);

    let mut chunk = vec![0xff, 0xfe, b'\n'];
    chunk.extend_from_slice(format!("{}\n", run_id_line("L4")).as_bytes());
    monitor.write(&chunk).unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("L4"));
}

#[test]
fn test_streams_keep_separate_partial_lines() {
    let (monitor, _rx) = OutputMonitor::new(10);

    monitor.write_from(OutputStream::Stdout, b"Allocated Run ").unwrap();
    monitor.write_from(OutputStream::Stderr, b"WARN something else\n").unwrap();
    monitor.write_from(OutputStream::Stdout, b"Name L3 to this run\n").unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("L3"));
}

#[test]
fn test_detection_on_stderr() {
    let (monitor, _rx) = OutputMonitor::new(10);
    let monitor = Arc::new(monitor);
    let sink = monitor.sink(OutputStream::Stderr);

    sink.write(format!("{}\n", run_id_line("E1")).as_bytes()).unwrap();
    sink.finish();

    assert_eq!(monitor.run_id().as_deref(), Some("E1"));
}

#[test]
fn test_later_different_run_id_is_ignored() {
    init_tracing();
    let (monitor, mut rx) = OutputMonitor::new(10);

    monitor.write(format!("{}\n", run_id_line("FIRST")).as_bytes()).unwrap();
    monitor.write(format!("{}\n", run_id_line("SECOND")).as_bytes()).unwrap();

    assert_eq!(monitor.run_id().as_deref(), Some("FIRST"));
    assert_eq!(
        drain(&mut rx),
        vec![
            Discovery::RunIdAllocated("FIRST".into()),
            Discovery::RunIdAllocated("FIRST".into()),
        ]
    );
}

#[test]
fn test_full_queue_drops_notification_but_keeps_state() {
    init_tracing();
    let (monitor, mut rx) = OutputMonitor::new(1);

    monitor.write(format!("{}\n", run_id_line("L0")).as_bytes()).unwrap();
    // Queue is full now; this notification is dropped.
    monitor.write(format!("{}\n", ras_line("file:///tmp/ras")).as_bytes()).unwrap();

    assert_eq!(drain(&mut rx), vec![Discovery::RunIdAllocated("L0".into())]);
    assert_eq!(monitor.ras_location().as_deref(), Some("file:///tmp/ras"));
}

#[test]
fn test_write_does_not_fail_without_receiver() {
    let (monitor, rx) = OutputMonitor::new(10);
    drop(rx);

    let line = format!("{}\n", run_id_line("L0"));
    assert_eq!(monitor.write(line.as_bytes()).unwrap(), line.len());
    assert_eq!(monitor.run_id().as_deref(), Some("L0"));
}

#[test]
fn test_output_text_contains_both_streams() {
    let (monitor, _rx) = OutputMonitor::new(10);
    monitor.write_from(OutputStream::Stdout, b"out line\n").unwrap();
    monitor.write_from(OutputStream::Stderr, b"err line\n").unwrap();

    let text = monitor.output_text();
    assert!(text.contains("out line"));
    assert!(text.contains("err line"));
}
