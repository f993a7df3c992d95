//! End-to-end segmentation scenarios

use activity_segmenter::config::{Config, ConfigError, WindowPolicy};
use activity_segmenter::core::{
    DatasetBuilder, EngineError, LabelSource, SegmentationEngine, SensorCatalog, TimeEncoding,
};
use activity_segmenter::stream::{ActivityMarker, Event, EventRecord, SensorState};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 11, 4)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn event(seconds: i64, marker: Option<&str>) -> Event {
    let e = Event::new(base() + Duration::seconds(seconds), "M001", SensorState::On);
    match marker {
        Some(m) => e.with_marker(ActivityMarker::parse(m).unwrap()),
        None => e,
    }
}

fn fixed_count(size: usize) -> Config {
    Config {
        window: WindowPolicy::FixedCount {
            window_size: size,
            emit_partial: false,
        },
        ..Config::default()
    }
}

#[test]
fn test_single_window_label_duration_and_counts() {
    let config = Config {
        sensors: SensorCatalog::new(vec!["M001".into(), "X".into()]),
        ..fixed_count(3)
    };
    let mut engine = SegmentationEngine::new(&config).unwrap();
    let records = vec![
        EventRecord::new("2010-11-04", "10:00:00", "M001", "OFF").with_activity("A,begin"),
        EventRecord::new("2010-11-04", "10:00:05", "X", "ON"),
        EventRecord::new("2010-11-04", "10:00:10.000000", "M001", "OFF").with_activity(" A , end "),
    ];

    let output = engine.segment_records(&records).unwrap();
    assert_eq!(output.records.len(), 1);

    let record = &output.records[0];
    let layout = engine.layout();
    assert_eq!(record.label.as_ref().unwrap().label, "A");
    let duration = record.features.duration(layout).unwrap();
    assert!((duration - 10.0 / 86_400.0).abs() < 1e-12);
    assert_eq!(record.features.sensor_counts(layout), &[0.0, 1.0]);
    assert!(engine.open_intervals().is_empty());
}

#[test]
fn test_duration_window_backs_off_to_last_event_in_range() {
    let mut engine = SegmentationEngine::new(&Config::default()).unwrap();
    let events = vec![event(0, None), event(250, None), event(340, None)];

    let output = engine.segment(&events).unwrap();
    assert_eq!(output.records.len(), 1);
    let window = &output.records[0].window;
    assert_eq!((window.start_index, window.end_index), (0, 1));
    assert_eq!(window.end_timestamp, base() + Duration::seconds(250));
    // The lone event at 340 cannot form a window on its own.
    assert_eq!(output.stats.degenerate_windows, 1);
}

#[test]
fn test_label_carried_forward_after_sleeping() {
    let mut engine = SegmentationEngine::new(&fixed_count(2)).unwrap();
    let events = vec![
        event(0, Some("Sleeping,begin")),
        event(600, Some("Sleeping,end")),
        event(700, None),
        event(710, None),
    ];

    let output = engine.segment(&events).unwrap();
    let labels: Vec<_> = output
        .records
        .iter()
        .map(|r| r.label.clone().unwrap())
        .collect();
    assert_eq!(labels[0].label, "Sleeping");
    assert_eq!(labels[0].majority_seconds, 600.0);
    assert_eq!(labels[1].label, "Sleeping");
    assert_eq!(labels[1].source, LabelSource::CarriedForward);
    assert_eq!(output.stats.labels_carried_forward, 1);
}

#[test]
fn test_interval_spanning_three_windows() {
    let mut engine = SegmentationEngine::new(&fixed_count(3)).unwrap();
    let events = vec![
        event(0, None),
        event(10, Some("Cooking,begin")),
        event(20, None),
        event(30, None),
        event(40, None),
        event(50, None),
        event(60, None),
        event(75, Some("Cooking,end")),
        event(80, None),
    ];

    let output = engine.segment(&events).unwrap();
    assert_eq!(output.records.len(), 3);

    let credits: Vec<f64> = output
        .records
        .iter()
        .map(|r| r.label.as_ref().unwrap().majority_seconds)
        .collect();
    assert_eq!(credits, vec![10.0, 30.0, 25.0]);
    assert_eq!(credits.iter().sum::<f64>(), 65.0);
    assert!(engine.open_intervals().is_empty());
}

#[test]
fn test_equal_durations_resolve_identically_across_runs() {
    let events = vec![
        event(0, Some("Relax,begin")),
        event(5, Some("Eating,begin")),
        event(15, Some("Relax,end")),
        event(20, Some("Eating,end")),
    ];

    let labels: Vec<String> = (0..5)
        .map(|_| {
            let mut engine = SegmentationEngine::new(&fixed_count(4)).unwrap();
            let output = engine.segment(&events).unwrap();
            output.records[0].label.clone().unwrap().label
        })
        .collect();

    assert!(labels.iter().all(|l| l == "Relax"));
}

#[test]
fn test_unmatched_end_policy_follows_window_policy() {
    let events = vec![event(0, None), event(20, Some("Relax,end")), event(30, None)];

    let mut dropping = SegmentationEngine::new(&fixed_count(3)).unwrap();
    let output = dropping.segment(&events).unwrap();
    assert_eq!(output.stats.unmatched_ends_dropped, 1);
    assert_eq!(output.records[0].label.as_ref().unwrap().label, "unknown");

    let mut backfilling = SegmentationEngine::new(&Config::default()).unwrap();
    let output = backfilling.segment(&events).unwrap();
    assert_eq!(output.stats.unmatched_ends_backfilled, 1);
    let label = output.records[0].label.clone().unwrap();
    assert_eq!(label.label, "Relax");
    assert_eq!(label.majority_seconds, 20.0);
}

#[test]
fn test_gap_bounded_unlabeled_extraction() {
    let config = Config {
        window: WindowPolicy::GapBounded {
            chunk_size: Some(3),
        },
        labeled: false,
        ..Config::default()
    };
    let mut engine = SegmentationEngine::new(&config).unwrap();

    let mut events = vec![event(0, Some("Sleeping,end"))];
    events.extend((1..=6).map(|i| event(i * 10, None)));
    events.push(event(70, Some("Relax,begin")));

    let output = engine.segment(&events).unwrap();
    let ranges: Vec<(usize, usize)> = output
        .records
        .iter()
        .map(|r| (r.window.start_index, r.window.end_index))
        .collect();
    assert_eq!(ranges, vec![(1, 3), (4, 6)]);
    assert!(output.records.iter().all(|r| r.label.is_none()));

    let gap = output.records[0].window.gap.as_ref().unwrap();
    assert_eq!(gap.preceding_activity, "Sleeping");
    assert_eq!(gap.following_activity, "Relax");
}

#[test]
fn test_gap_bounded_label_sees_activity_open_across_gap() {
    let config = Config {
        window: WindowPolicy::GapBounded { chunk_size: None },
        ..Config::default()
    };
    let mut engine = SegmentationEngine::new(&config).unwrap();
    let events = vec![
        event(0, Some("Sleeping,begin")),
        event(10, Some("Toilet,begin")),
        event(20, Some("Toilet,end")),
        event(30, None),
        event(40, None),
        event(50, None),
        event(60, Some("Relax,begin")),
    ];

    let output = engine.segment(&events).unwrap();
    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!((record.window.start_index, record.window.end_index), (3, 5));

    let label = record.label.as_ref().unwrap();
    assert_eq!(label.label, "Sleeping");
    assert_eq!(label.source, LabelSource::Majority);
    assert_eq!(label.majority_seconds, 30.0);
    assert!(engine.open_intervals().contains("Sleeping"));
}

#[test]
fn test_dataset_dump_blocks() {
    let mut engine = SegmentationEngine::new(&fixed_count(2)).unwrap();
    let events = vec![
        event(0, Some("Relax,begin")),
        event(10, None),
        event(20, None),
        event(30, Some("Relax,end")),
    ];
    let output = engine.segment(&events).unwrap();

    let builder = DatasetBuilder::new(engine.policy_name(), engine.layout().clone(), true);
    let dataset = builder.build(output);
    let dump = dataset.dump_string().unwrap();

    assert!(dump.starts_with(
        "X[0]: [\n    # Time Features (20 features: 10 for start date, 10 for end date)\n"
    ));
    assert!(dump.contains("    # Sensor Features (34 features)\n"));
    assert!(dump.contains("y[0]: 'Relax'\n"));
    assert!(dump.contains("y[1]: 'Relax'\n"));
    assert_eq!(dump.matches(&"_".repeat(50)).count(), 2);
    assert!(dump.ends_with(&format!("{}\n\n", "_".repeat(50))));
}

#[test]
fn test_full_encoding_vector_length() {
    let config = Config {
        time_encoding: TimeEncoding::Full,
        ..fixed_count(2)
    };
    let mut engine = SegmentationEngine::new(&config).unwrap();
    let output = engine.segment(&[event(0, None), event(1, None)]).unwrap();
    assert_eq!(output.records[0].features.len(), 14 + 14 + 1 + 34);
}

#[test]
fn test_empty_stream_is_an_error() {
    let mut engine = SegmentationEngine::new(&Config::default()).unwrap();
    assert!(matches!(engine.segment(&[]), Err(EngineError::EmptyStream)));
}

#[test]
fn test_invalid_configuration_is_rejected_at_setup() {
    assert!(matches!(
        "rolling".parse::<WindowPolicy>(),
        Err(ConfigError::UnknownPolicy(_))
    ));

    let config = Config {
        sensors: SensorCatalog::new(Vec::new()),
        ..Config::default()
    };
    assert!(matches!(
        SegmentationEngine::new(&config),
        Err(EngineError::Config(ConfigError::EmptyCatalog))
    ));

    let window: WindowPolicy = serde_json::from_str(
        r#"{"policy": "duration", "target_duration_seconds": 9.0e12, "tolerance_seconds": 30}"#,
    )
    .unwrap();
    let config = Config {
        window,
        ..Config::default()
    };
    assert!(matches!(
        SegmentationEngine::new(&config),
        Err(EngineError::Config(ConfigError::TargetTooLarge(_)))
    ));
}

proptest! {
    #[test]
    fn prop_duration_windows_contiguous_on_dense_stream(
        gaps in proptest::collection::vec(1i64..=60, 10..200),
    ) {
        let mut offset = 0;
        let mut events = vec![event(0, None)];
        for gap in &gaps {
            offset += gap;
            events.push(event(offset, None));
        }

        let mut engine = SegmentationEngine::new(&Config::default()).unwrap();
        let output = engine.segment(&events).unwrap();
        let windows: Vec<_> = output.records.iter().map(|r| &r.window).collect();

        prop_assert!(!windows.is_empty());
        prop_assert_eq!(windows[0].start_index, 0);
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].end_index + 1, pair[1].start_index);
        }
        prop_assert!(windows[windows.len() - 1].end_index + 2 >= events.len());
    }

    #[test]
    fn prop_partial_credits_sum_to_interval_length(
        size in 2usize..6,
        begin in 0usize..10,
        length in 1usize..15,
    ) {
        let total = 30;
        let end = begin + length;
        prop_assume!(end < (total / size) * size);

        let events: Vec<Event> = (0..total)
            .map(|i| {
                let marker = if i == begin {
                    Some("Relax,begin")
                } else if i == end {
                    Some("Relax,end")
                } else {
                    None
                };
                event(i as i64 * 10, marker)
            })
            .collect();

        let mut engine = SegmentationEngine::new(&fixed_count(size)).unwrap();
        let output = engine.segment(&events).unwrap();
        let credited: f64 = output
            .records
            .iter()
            .filter_map(|r| r.label.as_ref())
            .filter(|l| l.source == LabelSource::Majority)
            .map(|l| l.majority_seconds)
            .sum();

        prop_assert_eq!(credited, (length * 10) as f64);
    }
}
