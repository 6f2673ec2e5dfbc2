use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ferje_core::anonymizer::anonymize_mmsi;
use ferje_core::{CleanerConfig, Geofence, PipelineError, SignalCleaner, SkippedRowReason};
use ferje_parser::ParserError;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const POSITION_HEADER: &str =
    "mmsi;imo_num_ais;date_time_utc;lon;lat;sog;cog;true_heading;nav_status;message_nr";
const VESSELS: &str = "mmsi;imo;name;callsign;length;width;type\n\
257000001;9000001;MOHN;LAXY;35.6;10.4;Passenger";

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", path.display(), err))
}

fn positions(rows: &[&str]) -> String {
    std::iter::once(POSITION_HEADER)
        .chain(rows.iter().copied())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn cleans_fixture_pair() {
    let cleaner = SignalCleaner::default();
    let result = cleaner
        .clean(
            &fixture("2018-07-02.csv"),
            &fixture("2018-07-02_shipdata.csv"),
        )
        .expect("clean fixture");

    assert_eq!(result.signals.len(), 2);
    assert_eq!(result.excluded, 2);
    assert_eq!(result.skipped.len(), 2);

    let first = &result.signals[0];
    assert_eq!(first.timestamp, "2018-07-02T06:00:00+00:00");
    assert_eq!(first.ferry_id, anonymize_mmsi("257000001"));
    assert_eq!(first.lat, 63.4295);
    assert_eq!(first.lon, 10.395);
    assert_eq!(first.source, "ais");
    assert_eq!(first.metadata.length, 36.0);
    assert_eq!(first.metadata.width, 10.0);
    assert_eq!(first.metadata.vessel_type, "Passenger");
    assert_eq!(first.metadata.heading, 44.0);

    let second = &result.signals[1];
    assert_eq!(second.ferry_id, anonymize_mmsi("257000002"));
    assert_eq!(second.timestamp, "2018-07-02T06:00:20+00:00");
    assert_eq!(second.metadata.heading, 181.0);
}

#[test]
fn fixture_anomalies_are_reported_with_reasons() {
    let result = SignalCleaner::default()
        .clean(
            &fixture("2018-07-02.csv"),
            &fixture("2018-07-02_shipdata.csv"),
        )
        .expect("clean fixture");

    let orphan = &result.skipped[0];
    assert_eq!(orphan.line_number, 5);
    assert_eq!(orphan.reason, SkippedRowReason::OrphanSignal);
    assert_eq!(orphan.mmsi.as_deref(), Some("257999999"));

    let short = &result.skipped[1];
    assert_eq!(short.line_number, 6);
    assert_eq!(
        short.reason,
        SkippedRowReason::RowLengthMismatch {
            expected: 10,
            found: 4
        }
    );
    assert_eq!(short.reason.as_str(), "row_length_mismatch");
}

#[test]
fn one_inside_one_outside_yields_single_signal() {
    let text = positions(&[
        "257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1",
        "257000001;9000001;2018-07-02 08:00:10;10.3950;63.5000;10.2;45.0;44;0;1",
    ]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    assert_eq!(result.signals.len(), 1);
    assert!(result.skipped.is_empty());
    assert_eq!(result.excluded, 1);

    let signal = &result.signals[0];
    assert_eq!(signal.ferry_id, anonymize_mmsi("257000001"));
    assert_eq!(signal.metadata.vessel_type, "Passenger");
    assert_eq!(signal.metadata.length, 36.0);
    assert_eq!(signal.metadata.width, 10.0);
}

#[test]
fn short_rows_do_not_abort_the_batch() {
    let text = positions(&[
        "257000001;9000001;2018-07-02 08:00:00",
        "257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1",
        "",
    ]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.skipped.len(), 2);
    assert!(result
        .skipped
        .iter()
        .all(|row| matches!(row.reason, SkippedRowReason::RowLengthMismatch { .. })));
    assert_eq!(result.skipped[1].line_number, 4);
}

#[test]
fn orphan_signals_do_not_abort_the_batch() {
    let text = positions(&[
        "257888888;0;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1",
        "257000001;9000001;2018-07-02 08:00:05;10.3950;63.4295;10.2;45.0;44;0;1",
    ]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, SkippedRowReason::OrphanSignal);
    assert_eq!(result.signals[0].timestamp, "2018-07-02T06:00:05+00:00");
}

#[test]
fn orphan_outside_the_fence_is_excluded_not_reported() {
    let text = positions(&["257888888;0;2018-07-02 08:00:00;11.0;63.4295;10.2;45.0;44;0;1"]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    assert!(result.signals.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(result.excluded, 1);
}

#[test]
fn output_preserves_input_order() {
    let text = positions(&[
        "257000001;9000001;2018-07-02 08:00:30;10.3950;63.4295;10.2;45.0;30;0;1",
        "257000001;9000001;2018-07-02 08:00:10;10.3950;63.4295;10.2;45.0;10;0;1",
        "257000001;9000001;2018-07-02 08:00:20;10.3950;63.4295;10.2;45.0;20;0;1",
    ]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    let headings: Vec<f64> = result
        .signals
        .iter()
        .map(|signal| signal.metadata.heading)
        .collect();
    assert_eq!(headings, vec![30.0, 10.0, 20.0]);
}

#[test]
fn reordered_position_columns_are_resolved_by_name() {
    let text = "lat;lon;true_heading;date_time_utc;mmsi\n63.4295;10.3950;90;2018-01-15 12:00:00;257000001";
    let result = SignalCleaner::default()
        .clean(text, VESSELS)
        .expect("clean");

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].timestamp, "2018-01-15T11:00:00+00:00");
    assert_eq!(result.signals[0].metadata.heading, 90.0);
}

#[test]
fn unparseable_latitude_aborts_the_run() {
    let text = positions(&[
        "257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1",
        "257000001;9000001;2018-07-02 08:00:10;10.3950;north;10.2;45.0;44;0;1",
    ]);
    let err = SignalCleaner::default().clean(&text, VESSELS).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::InvalidNumber { ref column, line_number: 3, .. })
            if column == "lat"
    ));
}

#[test]
fn unparseable_timestamp_aborts_the_run() {
    let text = positions(&["257000001;9000001;02.07.2018 08:00;10.3950;63.4295;10.2;45.0;44;0;1"]);
    let err = SignalCleaner::default().clean(&text, VESSELS).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Timestamp { line_number: 2, .. }
    ));
}

#[test]
fn unparseable_heading_aborts_the_run() {
    let text = positions(&["257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;n/a;0;1"]);
    let err = SignalCleaner::default().clean(&text, VESSELS).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::InvalidNumber { ref column, .. }) if column == "true_heading"
    ));
}

#[test]
fn missing_position_column_aborts_the_run() {
    let text = "mmsi;lat;lon;date_time_utc\n257000001;63.4295;10.3950;2018-07-02 08:00:00";
    let err = SignalCleaner::default().clean(text, VESSELS).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::MissingColumn { table: "positions", ref column })
            if column == "true_heading"
    ));
}

#[test]
fn bad_vessel_table_aborts_the_run() {
    let vessels = "mmsi;imo;name;callsign;length;width;type\n257000001;1;MOHN;LAXY;long;10;Passenger";
    let text = positions(&["257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1"]);
    let err = SignalCleaner::default().clean(&text, vessels).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::InvalidNumber { table: "vessels", .. })
    ));
}

#[test]
fn header_only_input_yields_no_signals() {
    let result = SignalCleaner::default()
        .clean(POSITION_HEADER, VESSELS)
        .expect("clean");

    assert!(result.signals.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(result.excluded, 0);
}

#[test]
fn configured_area_zone_and_tag_are_used() {
    let config = CleanerConfig {
        geofence: Geofence::new(59.0, 60.0, 10.0, 11.0).expect("oslofjord"),
        timezone: chrono_tz::Tz::UTC,
        source_tag: "ais-test".to_string(),
        delimiter: ',',
    };
    let positions = "mmsi,lat,lon,date_time_utc,true_heading\n\
257000001,59.9,10.7,2018-07-02 08:00:00,12\n\
257000001,63.4295,10.3950,2018-07-02 08:00:00,12";
    let vessels = "mmsi,imo,name,callsign,length,width,type\n257000001,1,MOHN,LAXY,35,10,Passenger";

    let result = SignalCleaner::new(config)
        .clean(positions, vessels)
        .expect("clean");

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.excluded, 1);
    assert_eq!(result.signals[0].source, "ais-test");
    assert_eq!(result.signals[0].timestamp, "2018-07-02T08:00:00+00:00");
}

#[test]
fn signals_serialize_with_wire_field_names() {
    let text = positions(&["257000001;9000001;2018-07-02 08:00:00;10.3950;63.4295;10.2;45.0;44;0;1"]);
    let result = SignalCleaner::default()
        .clean(&text, VESSELS)
        .expect("clean");

    let value = serde_json::to_value(&result.signals[0]).expect("serialize");
    assert_eq!(value["ferryId"], anonymize_mmsi("257000001"));
    assert_eq!(value["source"], "ais");
    assert_eq!(value["metadata"]["type"], "Passenger");
    assert_eq!(value["metadata"]["heading"], 44.0);
    assert!(value.get("ferry_id").is_none());
}

#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.0
                .lock()
                .expect("events lock")
                .push((*event.metadata().level(), message));
        }
    }
}

impl CapturedEvents {
    fn count(&self, level: Level, message: &str) -> usize {
        self.0
            .lock()
            .expect("events lock")
            .iter()
            .filter(|(lvl, msg)| *lvl == level && msg == message)
            .count()
    }
}

#[test]
fn each_exclusion_and_skip_is_logged() {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());

    let result = tracing::subscriber::with_default(subscriber, || {
        SignalCleaner::default().clean(
            &fixture("2018-07-02.csv"),
            &fixture("2018-07-02_shipdata.csv"),
        )
    })
    .expect("clean fixture");

    assert_eq!(result.excluded, 2);
    assert_eq!(
        events.count(Level::DEBUG, "position outside operating area"),
        2
    );
    assert_eq!(
        events.count(Level::WARN, "position row shorter than header, skipping"),
        1
    );
    assert_eq!(
        events.count(
            Level::WARN,
            "signal inside operating area has no vessel metadata, skipping"
        ),
        1
    );
    assert_eq!(events.count(Level::INFO, "cleaned position table"), 1);
}
