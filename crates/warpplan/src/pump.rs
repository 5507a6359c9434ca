//! JSON-lines plumbing between byte streams and the planner loop.
//!
//! ```text
//! reader ──lines──▶ read_events ──mpsc──▶ Planner::run ──mpsc──▶ write_actions ──▶ writer
//! ```
//!
//! All three stages run concurrently in the calling task. End of input
//! drains the pipeline; a shutdown signal stops reading and planning after
//! the current event.
//!
//! Process stdin is read on its own thread instead (`spawn_stdin_reader`),
//! since a blocked stdin read cannot be cancelled and would hold up exit.

use std::io::BufRead;
use std::thread;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use warpplan_core::ActionEvent;
use warpplan_planner::Planner;

/// Capacity of the inbound and outbound channels.
pub const CHANNEL_CAPACITY: usize = 64;

/// Counters reported when a pump finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub events_read: u64,
    pub actions_published: u64,
    pub lines_written: u64,
}

/// Turn one input line into an event. Blank lines yield nothing; lines
/// that are not JSON are wrapped so the planner discards them.
pub fn parse_line(line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(line, "input line is not json");
            Some(json!({ "raw": line }))
        }
    }
}

/// Run the full pipeline until input ends or shutdown is signalled.
pub async fn pump<R, W>(
    planner: &mut Planner,
    reader: R,
    writer: &mut W,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<PumpStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let (read, driven) = tokio::join!(
        read_events(reader, event_tx, shutdown.clone()),
        drive(planner, event_rx, writer, shutdown),
    );

    let driven = driven?;
    Ok(PumpStats {
        events_read: read?,
        ..driven
    })
}

/// Plan events already on a channel and write the resulting actions.
///
/// Whoever feeds `events` counts them, so `events_read` stays zero.
pub async fn drive<W>(
    planner: &mut Planner,
    events: mpsc::Receiver<Value>,
    writer: &mut W,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<PumpStats>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let (action_tx, action_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let (actions_published, written) = tokio::join!(
        planner.run(events, action_tx, shutdown),
        write_actions(action_rx, writer),
    );

    Ok(PumpStats {
        events_read: 0,
        actions_published,
        lines_written: written?,
    })
}

/// Forward process stdin into `events` from a dedicated thread.
///
/// The thread stops at end of input, on a read error, or once `events`
/// is closed. It is never joined: a read blocked on an open stdin must not
/// keep the process alive after shutdown.
pub fn spawn_stdin_reader(
    events: mpsc::Sender<Value>,
) -> std::io::Result<thread::JoinHandle<u64>> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), &events))
}

/// Blocking counterpart of `read_events`. Returns the number forwarded.
fn forward_lines<R: BufRead>(reader: R, events: &mpsc::Sender<Value>) -> u64 {
    let mut forwarded = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to read input");
                break;
            }
        };
        let Some(event) = parse_line(&line) else {
            continue;
        };
        if events.blocking_send(event).is_err() {
            debug!(forwarded, "event stream closed, reader stopping");
            return forwarded;
        }
        forwarded += 1;
    }
    debug!(forwarded, "end of input");
    forwarded
}

/// Forward parsed lines into `events`. Returns the number forwarded.
pub async fn read_events<R>(
    reader: R,
    events: mpsc::Sender<Value>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    loop {
        tokio::select! {
            biased;
            Ok(()) = shutdown.changed() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(forwarded, "end of input");
                    break;
                };
                let Some(event) = parse_line(&line) else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
        }
    }
    Ok(forwarded)
}

/// Write each action as one JSON line, flushing after every line.
pub async fn write_actions<W>(
    mut actions: mpsc::Receiver<ActionEvent>,
    writer: &mut W,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while let Some(action) = actions.recv().await {
        let mut line = match serde_json::to_vec(&action) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode action event");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use warpplan_core::{ManualClock, PlannerConfig};

    fn planner() -> Planner {
        let clock = Arc::new(ManualClock::new(100.0));
        Planner::new(PlannerConfig::default(), None, clock).with_seed(5)
    }

    fn output_lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn non_json_lines_are_wrapped() {
        assert_eq!(parse_line("hello there"), Some(json!({"raw": "hello there"})));
        assert_eq!(parse_line("  "), None);
        assert_eq!(
            parse_line(r#" {"kind":"latency_metrics","p95_ms":10} "#),
            Some(json!({"kind": "latency_metrics", "p95_ms": 10}))
        );
    }

    #[tokio::test]
    async fn pumps_windows_to_json_lines() {
        let input = concat!(
            r#"{"kind":"latency_metrics","p95_ms":400,"replicas":2}"#,
            "\n",
            "not json at all\n",
            "\n",
            r#"{"kind":"deploy"}"#,
            "\n",
            r#"{"kind":"latency_metrics","p95_ms":"slow"}"#,
            "\n",
        );
        let mut out = Vec::new();
        let (_tx, rx) = watch::channel(false);

        let stats = pump(&mut planner(), input.as_bytes(), &mut out, rx)
            .await
            .unwrap();
        assert_eq!(
            stats,
            PumpStats {
                events_read: 4,
                actions_published: 2,
                lines_written: 2,
            }
        );

        let lines = output_lines(&out);
        assert_eq!(lines[0]["kind"], "plan");
        assert_eq!(lines[0]["decision"]["action"], "scale_up");
        assert_eq!(lines[0]["telemetry"]["replicas"], 2);
        assert_eq!(lines[1]["kind"], "error");
        assert_eq!(lines[1]["raw"]["p95_ms"], "slow");
    }

    #[tokio::test]
    async fn shutdown_before_input_publishes_nothing() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut out = Vec::new();

        let stats = pump(
            &mut planner(),
            r#"{"kind":"latency_metrics","p95_ms":400}"#.as_bytes(),
            &mut out,
            rx,
        )
        .await
        .unwrap();
        assert_eq!(stats.actions_published, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn forward_lines_stops_when_events_close() {
        let (tx, mut rx) = mpsc::channel(1);
        let input = "{\"kind\":\"a\"}\n\n{\"kind\":\"b\"}\n{\"kind\":\"c\"}\n";

        let reader = thread::spawn(move || forward_lines(input.as_bytes(), &tx));
        let first = rx.blocking_recv().unwrap();
        assert_eq!(first["kind"], "a");
        drop(rx);

        // One more event may fit in the channel before the close is seen.
        let forwarded = reader.join().unwrap();
        assert!((1..=2).contains(&forwarded), "{forwarded}");
    }

    #[tokio::test]
    async fn drive_stops_on_shutdown_while_input_stays_open() {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut out = Vec::new();
        let mut planner = planner();

        event_tx
            .send(json!({"kind": "latency_metrics", "p95_ms": 400}))
            .await
            .unwrap();
        let signal = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            shutdown_tx.send(true).unwrap();
        };

        // `event_tx` stays alive, like a stdin nobody closes.
        let (stats, ()) = tokio::join!(
            drive(&mut planner, event_rx, &mut out, shutdown_rx),
            signal,
        );
        let stats = stats.unwrap();
        assert_eq!(stats.actions_published, 1);
        assert_eq!(stats.lines_written, 1);
        assert_eq!(output_lines(&out)[0]["decision"]["action"], "scale_up");
        drop(event_tx);
    }
}
