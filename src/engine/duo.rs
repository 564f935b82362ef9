//! Two-participant relay

use super::state::ConversationState;
use super::{prompts, Exit, TurnEngine, TurnFailure};

impl TurnEngine {
    /// The opener speaks first every round and the responder answers what
    /// the opener just said. From round 2 on, the opener's message quotes
    /// the responder's last reply.
    pub(super) async fn run_duo(
        &self,
        state: &mut ConversationState,
        initial_prompt: Option<&str>,
    ) -> Result<Exit, TurnFailure> {
        let opener = state.current().to_string();
        let responder = state.roster().next_after(&opener).to_string();
        let mut message =
            initial_prompt.map_or_else(|| prompts::duo_opening(&responder), str::to_string);

        while state.has_rounds_left() {
            let round = state.begin_round();
            tracing::info!(round, %opener, %responder, "Duo round");

            let reply = self.take_turn(state, &opener, &message).await?;
            state.hand_to(&responder);

            let relay = prompts::duo_relay(&opener, &reply);
            let answer = self.take_turn(state, &responder, &relay).await?;
            state.hand_to(&opener);

            message = prompts::duo_continue(&responder, &answer);
        }

        Ok(Exit::Exhausted)
    }
}
