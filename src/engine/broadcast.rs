//! Broadcast routing: inline PASS, fire-and-forget observer notices

use super::state::ConversationState;
use super::{prompts, Exit, TurnEngine, TurnFailure};
use crate::directive::{self, Directive, InvalidTarget};

impl TurnEngine {
    pub(super) async fn run_broadcast(
        &self,
        state: &mut ConversationState,
        initial_prompt: Option<&str>,
    ) -> Result<Exit, TurnFailure> {
        let reminder = prompts::broadcast_reminder(state.roster());
        let mut message = initial_prompt.map_or_else(
            || prompts::broadcast_opening(state.roster(), state.current()),
            str::to_string,
        );

        while state.has_rounds_left() {
            let round = state.begin_round();
            let speaker = state.current().to_string();

            let reply = self.take_turn(state, &speaker, &message).await?;
            let directive = directive::parse(&reply);
            tracing::info!(round, %speaker, directive = directive.kind(), "Broadcast turn parsed");

            message = match directive {
                Directive::End { .. } => {
                    self.system(format!("{speaker} ended the conversation")).await;
                    let notice = prompts::broadcast_end_notice(&speaker, &reply);
                    self.announce_end(state, &speaker, &notice).await;
                    return Ok(Exit::Ended { by: speaker });
                }

                Directive::Pass {
                    target,
                    content,
                    inline,
                } => match check_inline_pass(state, &speaker, &target, inline) {
                    Ok(()) => {
                        self.system(format!("{speaker} passed to {target}")).await;
                        let said = directive::preamble(&reply);
                        let notice = prompts::broadcast_observer(&speaker, said, &target, &content);
                        let bystanders =
                            state.roster().others(&[speaker.as_str(), target.as_str()]);
                        for observer in bystanders {
                            self.notify(&observer, &notice).await;
                        }
                        state.hand_to(&target);
                        prompts::broadcast_passed(&speaker, said, &content, &reminder)
                    }
                    Err(invalid) => {
                        tracing::warn!(error = %invalid, "Invalid pass target");
                        self.system(format!(
                            "Invalid pass target from {speaker} ({invalid}), continuing normally"
                        ))
                        .await;
                        state.advance();
                        prompts::said(&speaker, &reply, &reminder)
                    }
                },

                // No redirect in broadcast mode
                Directive::Respond { .. } | Directive::Redirect { .. } => {
                    state.advance();
                    prompts::said(&speaker, &reply, &reminder)
                }
            };
        }

        Ok(Exit::Exhausted)
    }
}

fn check_inline_pass(
    state: &ConversationState,
    speaker: &str,
    target: &str,
    inline: bool,
) -> Result<(), InvalidTarget> {
    state.roster().check_pass(speaker, target)?;
    if !inline {
        return Err(InvalidTarget::MissingContent {
            speaker: speaker.to_string(),
            target: target.to_string(),
        });
    }
    Ok(())
}
