use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use nback::clock::ManualClock;
use nback::{NBackError, Pacing, RunState, Sequence, TaskConfig, TaskEngine, TaskEvent};
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

fn self_paced(numbers: &[u32], n: usize) -> TaskEngine<ManualClock> {
    let config = TaskConfig::new(n, numbers.len(), 0..=9).unwrap();
    let sequence = Sequence::from_numbers(n, numbers.to_vec()).unwrap();
    TaskEngine::with_sequence(config, sequence, ManualClock::new()).unwrap()
}

#[test]
fn two_back_example_scores_every_position() {
    let mut engine = self_paced(&[3, 7, 3, 7, 3, 7], 2);
    let completes = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&completes);
    engine.add_event_listener(move |e: &TaskEvent| {
        if matches!(e, TaskEvent::Complete { .. }) {
            *sink.lock().unwrap() += 1;
        }
    });

    engine.start().unwrap();
    // Claim "target" everywhere: wrong on the first two, right afterwards
    for _ in 0..6 {
        engine.respond(true).unwrap();
        engine.force_advance().unwrap();
    }

    assert_eq!(engine.run_state(), RunState::Completed);
    assert_eq!(*completes.lock().unwrap(), 1);

    let correct: Vec<bool> = engine.all_results().iter().map(|r| r.was_correct).collect();
    assert_eq!(correct, vec![false, false, true, true, true, true]);

    let stats = engine.results().summary_stats();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.false_alarms, 2);
    assert_eq!(stats.accuracy_pct, Some(66.7));
}

#[test]
fn completed_run_rejects_everything() {
    let mut engine = self_paced(&[1, 1], 1);
    engine.start().unwrap();
    engine.force_advance().unwrap();
    engine.force_advance().unwrap();
    assert!(engine.is_completed());

    assert_matches!(engine.respond(true), Err(NBackError::Completed));
    assert_matches!(engine.force_advance(), Err(NBackError::Completed));
    assert_matches!(engine.start(), Err(NBackError::Completed));
    assert_eq!(engine.results().len(), 2);
}

#[test]
fn generated_runs_have_one_result_per_number() {
    let config = TaskConfig::new(3, 40, 1..=4).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let sequence = Sequence::generate(&config, &mut rng).unwrap();
    let expected_targets = sequence.target_count();

    let mut engine = TaskEngine::with_sequence(config, sequence, ManualClock::new()).unwrap();
    engine.start().unwrap();
    while !engine.is_completed() {
        engine.force_advance().unwrap();
    }

    let stats = engine.results().summary_stats();
    assert_eq!(stats.total, 40);
    assert_eq!(stats.forced, 40);
    assert_eq!(stats.targets, expected_targets);
    assert_eq!(stats.misses, expected_targets);
}

#[test]
fn timed_run_without_focus_moves_straight_to_next_number() {
    let config = TaskConfig::new(1, 3, 1..=9)
        .unwrap()
        .with_pacing(Pacing::Timed {
            tick_interval_ms: 300,
            focus_duration_ms: 0,
        })
        .unwrap()
        .with_timeout_response(true);
    let sequence = Sequence::from_numbers(1, vec![4, 4, 5]).unwrap();
    let clock = ManualClock::new();
    let mut engine = TaskEngine::with_sequence(config, sequence, clock.clone()).unwrap();

    engine.start().unwrap();
    for _ in 0..3 {
        clock.advance(300);
        engine.poll().unwrap();
    }

    assert!(engine.is_completed());
    let claimed: Vec<bool> = engine.all_results().iter().map(|r| r.claimed_target()).collect();
    assert_eq!(claimed, vec![true, true, true]);
    let correct: Vec<bool> = engine.all_results().iter().map(|r| r.was_correct).collect();
    assert_eq!(correct, vec![false, true, false]);
}

proptest! {
    #[test]
    fn correctness_matches_ground_truth(
        numbers in prop::collection::vec(0u32..4, 3..30),
        answers in prop::collection::vec(any::<bool>(), 30),
        n in 1usize..3,
    ) {
        let mut engine = self_paced(&numbers, n);
        engine.start().unwrap();
        for answer in answers.iter().take(numbers.len()) {
            engine.respond(*answer).unwrap();
            engine.force_advance().unwrap();
        }

        prop_assert!(engine.is_completed());
        prop_assert_eq!(engine.all_results().len(), numbers.len());
        for (i, r) in engine.all_results().iter().enumerate() {
            let truth = i >= n && numbers[i] == numbers[i - n];
            prop_assert_eq!(r.index, i);
            prop_assert_eq!(r.was_target, truth);
            prop_assert_eq!(r.was_correct, answers[i] == truth);
            prop_assert!(!r.was_forced);
        }
    }
}
