//! Smart routing: round-robin plus PASS, REDIRECT and END

use super::state::ConversationState;
use super::{prompts, Exit, TurnEngine, TurnFailure};
use crate::detector;
use crate::directive::{self, Directive};
use crate::transcript::TranscriptEntry;

/// Replies quoted after a plain response or a redirect
const CONTINUE_CONTEXT: usize = 2;

/// Replies quoted after a pass
const PASS_CONTEXT: usize = 3;

impl TurnEngine {
    pub(super) async fn run_smart(
        &self,
        state: &mut ConversationState,
        initial_prompt: Option<&str>,
    ) -> Result<Exit, TurnFailure> {
        let reminder = prompts::smart_reminder(state.roster());
        let mut message = initial_prompt.map_or_else(
            || prompts::smart_opening(state.roster(), state.current()),
            str::to_string,
        );

        while state.has_rounds_left() {
            let round = state.begin_round();
            let speaker = state.current().to_string();

            let reply = self.take_turn(state, &speaker, &message).await?;
            let directive = directive::parse(&reply);
            tracing::info!(round, %speaker, directive = directive.kind(), "Smart turn parsed");

            message = match directive {
                Directive::End { .. } => {
                    self.system(format!("{speaker} ended the conversation")).await;
                    let notice = prompts::smart_end_notice(&speaker, &reply);
                    self.announce_end(state, &speaker, &notice).await;
                    return Ok(Exit::Ended { by: speaker });
                }

                Directive::Pass { target, content, .. } => {
                    match state.roster().check_pass(&speaker, &target) {
                        Ok(()) => {
                            self.system(format!("{speaker} passed to {target}")).await;
                            let history = state.recent(PASS_CONTEXT);
                            self.poll_observers(state, &speaker, &target, &history).await;
                            state.hand_to(&target);
                            prompts::smart_passed(&history, &speaker, &content, &reminder)
                        }
                        Err(invalid) => {
                            tracing::warn!(error = %invalid, "Invalid pass target");
                            self.system(format!(
                                "Invalid pass target from {speaker} ({invalid}), \
                                 continuing normally"
                            ))
                            .await;
                            state.advance();
                            prompts::smart_continue(&state.recent(CONTINUE_CONTEXT), &reminder)
                        }
                    }
                }

                Directive::Redirect { content } => {
                    match state.bounce_back().map(str::to_string) {
                        Some(back_to) => {
                            self.system(format!("{speaker} redirected to {back_to}")).await;
                            prompts::smart_clarify(
                                &state.recent(CONTINUE_CONTEXT),
                                &speaker,
                                &content,
                                state.roster(),
                            )
                        }
                        None => {
                            tracing::debug!(%speaker, "Redirect with no previous speaker");
                            self.system("No one to redirect to, continuing normally").await;
                            state.advance();
                            prompts::smart_continue(&state.recent(CONTINUE_CONTEXT), &reminder)
                        }
                    }
                }

                Directive::Respond { .. } => {
                    state.advance();
                    prompts::smart_continue(&state.recent(CONTINUE_CONTEXT), &reminder)
                }
            };
        }

        Ok(Exit::Exhausted)
    }

    /// Show the pass to everyone not involved, one at a time, and give each
    /// a short chance to acknowledge. Nothing here can fail the round.
    async fn poll_observers(
        &self,
        state: &mut ConversationState,
        speaker: &str,
        target: &str,
        history: &str,
    ) {
        let notice = prompts::observer_notice(history, speaker, target);

        for observer in state.roster().others(&[speaker, target]) {
            let channel = match self.channel(&observer) {
                Ok(channel) => channel,
                Err(e) => {
                    tracing::debug!(%observer, error = %e, "Observer skipped");
                    continue;
                }
            };
            if let Err(e) = self.deliver(&**channel, &observer, &notice).await {
                tracing::debug!(%observer, error = %e, "Observer notice not delivered");
                continue;
            }

            let profile = channel.profile().bounded(self.settings.observer_ack_wait);
            match detector::await_with(&**channel, state.last_seen(&observer), &profile).await {
                Ok(ack) => {
                    tracing::debug!(%observer, "Observer acknowledged");
                    self.record(TranscriptEntry::reply_from(&observer, &ack)).await;
                    state.remember(&observer, &ack);
                }
                Err(e) => {
                    tracing::debug!(%observer, error = %e, "Observer did not acknowledge");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::super::ConversationOutcome;
    use crate::channel::testing::{Reply, ScriptedChannel};

    #[tokio::test(start_paused = true)]
    async fn test_round_robin_in_roster_order() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["a speaks first", "a again"]),
            ScriptedChannel::new("b").replying(["b speaks"]),
            ScriptedChannel::new("c").replying(["c speaks"]),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 4, None, None).await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 4 });

        let turns: Vec<String> = h
            .log
            .lines()
            .into_iter()
            .filter(|(label, _)| label.starts_with("USER_TO_"))
            .map(|(label, _)| label)
            .collect();
        assert_eq!(turns, vec!["USER_TO_A", "USER_TO_B", "USER_TO_C", "USER_TO_A"]);

        assert!(h.sent("a")[0].starts_with("You're in a 3-way conversation ONLY with b, c."));
        let to_c = &h.sent("c")[0];
        assert!(to_c.starts_with("Recent conversation:\n\na: a speaks first\n\nb: b speaks\n\n"));
        assert!(to_c.ends_with("(only from: a, b, c), \"REDIRECT\", or \"END CONVERSATION\"."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_polls_observers_before_target() {
        let h = Harness::new([
            ScriptedChannel::new("s")
                .replying(["I'd like t's take. PASS TO t: what do you think?"]),
            ScriptedChannel::new("t").replying(["Here is my view."]),
            ScriptedChannel::new("o1").with_replies([Reply::Silent]),
            ScriptedChannel::new("o2").replying(["noted"]),
        ]);

        let outcome = h
            .engine
            .start_smart(&["s", "t", "o1", "o2"], 2, Some("Discuss"), None)
            .await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 2 });

        // Only the two bystanders were notified
        for observer in ["o1", "o2"] {
            let sent = h.sent(observer);
            assert_eq!(sent.len(), 1);
            assert!(sent[0].starts_with("[OBSERVER] Recent conversation:"));
            assert!(sent[0].contains("s passed to t."));
        }
        assert_eq!(h.sent("s").len(), 1);

        // o2's ack is logged before t is addressed; o1's silence is ignored
        let ack = h.log.position("O2").unwrap();
        let to_t = h.log.position("USER_TO_T").unwrap();
        assert!(ack < to_t);
        assert_eq!(h.log.count("O1"), 0);

        assert_eq!(
            h.sent("t")[0],
            format!(
                "Recent conversation:\n\ns: I'd like t's take. PASS TO t: what do you think?\n\n\
                 s passed to you with: \"what do you think?\"\n\n{}",
                "Please respond, then optionally add \"PASS TO [name]\" (only from: s, t, o1, o2), \
                 \"REDIRECT\", or \"END CONVERSATION\"."
            )
        );
        assert!(h.log.system_lines().contains(&"s passed to t".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_pass_falls_back_to_round_robin() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["PASS TO zed: over to you"]),
            ScriptedChannel::new("b").replying(["PASS TO b: me again"]),
            ScriptedChannel::new("c").replying(["fine"]),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 3, Some("go"), None).await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 3 });

        // Nobody was treated as an observer and the order stayed a, b, c
        assert_eq!(h.sent("a").len(), 1);
        assert_eq!(h.sent("b").len(), 1);
        assert_eq!(h.sent("c").len(), 1);

        let system = h.log.system_lines();
        assert!(system.iter().any(|l| l.starts_with("Invalid pass target from a")));
        assert!(system.iter().any(|l| l.starts_with("Invalid pass target from b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_bounces_back() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["We should use a queue.", "I meant a FIFO queue."]),
            ScriptedChannel::new("b").replying(["REDIRECT which kind of queue?"]),
            ScriptedChannel::new("c"),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 3, Some("go"), None).await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 3 });

        let to_a = h.sent("a");
        assert_eq!(to_a.len(), 2);
        assert!(to_a[1].contains("b asks you to clarify: \"which kind of queue?\""));
        assert!(to_a[1].contains("Please respond with clarification, then optionally add"));
        assert!(h.sent("c").is_empty());
        assert!(h.log.system_lines().contains(&"b redirected to a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_without_previous_speaker_rotates() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["redirect please"]),
            ScriptedChannel::new("b").replying(["ok"]),
            ScriptedChannel::new("c"),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 2, Some("go"), None).await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 2 });
        assert_eq!(h.sent("b").len(), 1);
        assert!(h
            .log
            .system_lines()
            .contains(&"No one to redirect to, continuing normally".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_observer_does_not_stop_pass() {
        let h = Harness::new([
            ScriptedChannel::new("s").replying(["PASS TO t: your turn"]),
            ScriptedChannel::new("t").replying(["on it"]),
            ScriptedChannel::unreachable("o1"),
            ScriptedChannel::new("o2").replying(["noted"]),
        ]);

        let outcome = h
            .engine
            .start_smart(&["s", "t", "o1", "o2"], 2, Some("go"), None)
            .await;
        assert_eq!(outcome, ConversationOutcome::Completed { rounds: 2 });

        assert!(h.sent("o1").is_empty());
        assert_eq!(h.log.count("USER_TO_O1"), 0);
        assert_eq!(h.log.count("O2"), 1);
        assert_eq!(h.sent("t").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_recipient_does_not_block_end() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["That's all from me. END CONVERSATION"]),
            ScriptedChannel::unreachable("b"),
            ScriptedChannel::new("c"),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 5, Some("go"), None).await;
        assert_eq!(
            outcome,
            ConversationOutcome::Ended {
                by: "a".into(),
                rounds: 1
            }
        );
        assert_eq!(h.sent("c").len(), 1);
        assert!(h.sent("c")[0].starts_with("[CONVERSATION ENDED] a ended with:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_notifies_everyone_else() {
        let long_goodbye = format!("{} END CONVERSATION", "bye ".repeat(80));
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["opening thoughts"]),
            ScriptedChannel::new("b").replying([long_goodbye.clone()]),
            ScriptedChannel::new("c"),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 10, Some("go"), None).await;
        assert_eq!(
            outcome,
            ConversationOutcome::Ended {
                by: "b".into(),
                rounds: 2
            }
        );

        let head: String = long_goodbye.chars().take(200).collect();
        let notice = format!("[CONVERSATION ENDED] b ended with: \"{head}...\"");
        assert_eq!(h.sent("a").last(), Some(&notice));
        assert_eq!(h.sent("c"), vec![notice]);
        assert_eq!(h.sent("b").len(), 1);

        let system = h.log.system_lines();
        assert_eq!(system.last().unwrap(), "Conversation ended by b after 2 rounds");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_speaker_aborts() {
        let h = Harness::new([
            ScriptedChannel::new("a").replying(["hello"]),
            ScriptedChannel::new("b"),
            ScriptedChannel::new("c"),
        ]);

        let outcome = h.engine.start_smart(&["a", "b", "c"], 5, Some("go"), None).await;
        assert_eq!(
            outcome,
            ConversationOutcome::NoResponse {
                participant: "b".into(),
                rounds: 2
            }
        );
        assert!(h.sent("c").is_empty());
    }
}
