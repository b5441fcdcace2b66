use crate::{Effect, Msg, Session, SessionError};

/// Pure update function: applies a message to the session and returns any effects.
pub fn update(mut session: Session, msg: Msg) -> (Session, Vec<Effect>) {
    let effects = match msg {
        Msg::StartClicked => rejected_on_err(session.start()),
        Msg::AttachRequested => rejected_on_err(session.attach()),
        Msg::StartResponded(outcome) => session.on_start_outcome(outcome),
        Msg::Tick(report) => session.tick(report),
        Msg::CancelClicked => rejected_on_err(session.cancel()),
        Msg::CancelAcknowledged { ok } => session.on_cancel_acknowledged(ok),
        Msg::ForceStopClicked => session.force_stop(),
        Msg::ForceStopAcknowledged { ok } => session.on_force_stop_acknowledged(ok),
        Msg::ClearLogClicked => rejected_on_err(session.clear_log()),
        Msg::NoOp => Vec::new(),
    };

    (session, effects)
}

fn rejected_on_err(result: Result<Vec<Effect>, SessionError>) -> Vec<Effect> {
    result.unwrap_or_else(|err| vec![Effect::Rejected(err)])
}
