//! Event construction and time normalization properties

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use eventstore_core::{
    Event, TimeInput, TimeWindow, ValidationError, Direction, SOURCE_KEY, TIMESTAMP_KEY,
};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 2, 12, 34, 56).unwrap() + chrono::Duration::milliseconds(789)
}

#[test]
fn test_attributes_roundtrip_exactly() {
    let samples: Vec<BTreeMap<String, String>> = vec![
        BTreeMap::new(),
        [("key1", "value1 - #0"), ("key2", "value2 - #0")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        [("LOTNAME", "A12345"), ("PROCESSID", "p-1"), ("a_b", ""), ("ünï", "çødé")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ];

    for attributes in samples {
        let event = Event::new(ts(), "test_source", attributes.clone()).unwrap();
        assert_eq!(event.attributes(), &attributes);
    }
}

#[test]
fn test_every_reserved_key_is_rejected() {
    for key in ["_", "_x", "__", "_source", "_timestamp", "_illegal_"] {
        let err = Event::from_pairs(ts(), "test_source", [(key, "v")]).unwrap_err();
        assert_eq!(err, ValidationError::ReservedAttributeKey(key.to_string()));
    }
}

#[test]
fn test_reserved_key_among_valid_ones_is_rejected() {
    let result = Event::from_pairs(
        ts(),
        "test_source",
        [("fine", "1"), ("_bad", "2"), ("also_fine", "3")],
    );
    assert!(result.is_err());
}

#[test]
fn test_virtual_keys_not_in_attributes() {
    let event = Event::from_pairs(ts(), "test_source", [("k", "v")]).unwrap();
    assert!(!event.attributes().contains_key(SOURCE_KEY));
    assert!(!event.attributes().contains_key(TIMESTAMP_KEY));
    assert_eq!(event.get(SOURCE_KEY).unwrap().as_deref(), Some("test_source"));
}

#[test]
fn test_window_from_mixed_inputs() {
    let window = TimeWindow::from_inputs(
        Some(TimeInput::from("2010-01-02T12:35:21.789Z")),
        Some(TimeInput::from(ts())),
    )
    .unwrap();
    assert_eq!(window.direction(), Direction::Descending);
    assert_eq!(window.lower(), Some(ts()));
}

#[test]
fn test_window_rejects_bad_text() {
    let err = TimeWindow::from_inputs(Some(TimeInput::from("not a date")), None).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidTimestamp(_)));
}
