#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to start a deployment.
    StartClicked,
    /// A job was found running on load; follow it.
    AttachRequested,
    /// Job runner answered the start request.
    StartResponded(crate::StartOutcome),
    /// Results of one polling tick.
    Tick(crate::TickReport),
    /// User clicked Cancel.
    CancelClicked,
    /// Job runner answered the cancel request.
    CancelAcknowledged { ok: bool },
    /// Operator clicked Force Stop.
    ForceStopClicked,
    /// Job runner answered the force-stop request.
    ForceStopAcknowledged { ok: bool },
    /// User clicked Clear Log.
    ClearLogClicked,
    /// Fallback for placeholder wiring.
    NoOp,
}
