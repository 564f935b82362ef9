//! Property-based tests for speaking order and conversation state

use super::state::*;
use proptest::prelude::*;

fn arb_roster() -> impl Strategy<Value = Roster> {
    prop::collection::hash_set("[a-z]{1,8}", 3..8).prop_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        Roster::new(Topology::Smart, &names).unwrap()
    })
}

#[derive(Debug, Clone)]
enum Step {
    Advance,
    PassTo(usize),
    BounceBack,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Advance),
        (0usize..8).prop_map(Step::PassTo),
        Just(Step::BounceBack),
    ]
}

proptest! {
    #[test]
    fn next_after_is_cyclic(roster in arb_roster()) {
        let names = roster.names();
        let n = names.len();
        for k in 0..n {
            prop_assert_eq!(roster.next_after(&names[k]), names[(k + 1) % n].as_str());
        }
    }

    #[test]
    fn n_advances_return_to_start(roster in arb_roster(), start in 0usize..8) {
        let n = roster.names().len();
        let starter = roster.names()[start % n].clone();
        let mut state = ConversationState::new(Topology::Smart, roster, Some(&starter), 0).unwrap();
        for _ in 0..n {
            state.advance();
        }
        prop_assert_eq!(state.current(), starter.as_str());
    }

    #[test]
    fn current_speaker_stays_on_roster(
        roster in arb_roster(),
        steps in prop::collection::vec(arb_step(), 0..40),
    ) {
        let names = roster.names().to_vec();
        let mut state = ConversationState::new(Topology::Smart, roster, None, 40).unwrap();

        for step in steps {
            let before = state.round();
            if state.has_rounds_left() {
                prop_assert!(state.begin_round() > before);
            }
            match step {
                Step::Advance => state.advance(),
                Step::PassTo(i) => {
                    let target = names[i % names.len()].clone();
                    if state.roster().check_pass(state.current(), &target).is_ok() {
                        state.hand_to(&target);
                    }
                }
                Step::BounceBack => {
                    let _ = state.bounce_back();
                }
            }
            prop_assert!(names.iter().any(|n| n == state.current()));
            if let Some(prev) = state.previous() {
                prop_assert_ne!(prev, state.current());
            }
            prop_assert!(state.round() <= state.round_limit());
        }
    }
}
