use crate::types::MeasurementKind;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Downstream consumer of a sampler's scaled output.
pub trait Sink: Send + Sync {
    fn notify(&self, value: f64);
}

impl<F> Sink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn notify(&self, value: f64) {
        self(value)
    }
}

/// One scaled sample, labelled for the telemetry stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub path: String,
    pub slot: usize,
    pub kind: MeasurementKind,
    pub value: f64,
    /// SI unit of `value`.
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// Forwards timestamped [`Reading`]s over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    path: String,
    slot: usize,
    kind: MeasurementKind,
    tx: UnboundedSender<Reading>,
}

impl ChannelSink {
    pub fn new(
        path: impl Into<String>,
        slot: usize,
        kind: MeasurementKind,
        tx: UnboundedSender<Reading>,
    ) -> Self {
        Self {
            path: path.into(),
            slot,
            kind,
            tx,
        }
    }
}

impl Sink for ChannelSink {
    fn notify(&self, value: f64) {
        let reading = Reading {
            path: self.path.clone(),
            slot: self.slot,
            kind: self.kind,
            value,
            unit: self.kind.unit().to_string(),
            ts: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        };
        if self.tx.send(reading).is_err() {
            debug!(path = %self.path, "reading dropped: receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = move |v: f64| s.lock().unwrap().push(v);
        sink.notify(1.5);
        sink.notify(-0.25);
        assert_eq!(*seen.lock().unwrap(), vec![1.5, -0.25]);
    }

    #[test]
    fn test_channel_sink_labels_readings() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(
            "electrical.house.voltage",
            2,
            MeasurementKind::BusVoltage,
            tx,
        );
        sink.notify(12.5);

        let reading = rx.try_recv().unwrap();
        assert_eq!(reading.path, "electrical.house.voltage");
        assert_eq!(reading.slot, 2);
        assert_eq!(reading.kind, MeasurementKind::BusVoltage);
        assert_eq!(reading.value, 12.5);
        assert_eq!(reading.unit, "V");
        assert!(reading.ts.is_some());

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["kind"], "bus_voltage");
        assert_eq!(json["unit"], "V");
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelSink::new("x", 0, MeasurementKind::Power, tx).notify(1.0);
    }
}
