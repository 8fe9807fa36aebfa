//! Property tests for turning pasted text into work items

use super::test_utils::Harness;
use flashbatch::batch::{split_into_items, BatchJob, ExecutionState};
use proptest::prelude::*;

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t]{1,4}",
        "[ \t]{0,2}[A-Za-zÄÖÜäöüß .,!?]{1,30}[ \t]{0,2}",
    ]
}

fn text_strategy() -> impl Strategy<Value = String> {
    (prop::collection::vec(line_strategy(), 0..30), any::<bool>()).prop_map(|(lines, crlf)| {
        let separator = if crlf { "\r\n" } else { "\n" };
        lines.join(separator)
    })
}

fn expected_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

proptest! {
    #[test]
    fn prop_one_item_per_non_blank_line(text in text_strategy()) {
        let items = split_into_items(&text);
        let originals: Vec<String> = items.iter().map(|item| item.original.clone()).collect();
        prop_assert_eq!(originals, expected_items(&text));
        prop_assert!(items.iter().all(|item| item.is_pending()));
    }

    #[test]
    fn prop_new_job_has_nothing_settled(text in text_strategy()) {
        let job = BatchJob::from_text(&text);
        prop_assert_eq!(job.total(), expected_items(&text).len());
        prop_assert_eq!(job.completed(), 0);
        prop_assert_eq!(job.succeeded() + job.failed(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_started_job_settles_every_line(text in text_strategy()) {
        let expected = expected_items(&text);
        let mut h = Harness::new(Vec::new());

        match h.controller.start(&text) {
            Ok(_) => {
                prop_assert!(!expected.is_empty());
                h.pump_until_idle();
                let settled: Vec<String> = h
                    .sink
                    .finished_items
                    .iter()
                    .map(|(_, item)| item.original.clone())
                    .collect();
                prop_assert_eq!(settled, expected.clone());
                prop_assert_eq!(h.sink.progress.last().copied(), Some((expected.len(), expected.len())));
                prop_assert_eq!(h.backend.call_count(), expected.len());
            }
            Err(_) => {
                prop_assert!(expected.is_empty());
                prop_assert_eq!(h.controller.state(), ExecutionState::Idle);
            }
        }
    }
}
