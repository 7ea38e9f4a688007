//! Authorization flow state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The authorizer executes the I/O implied by each action.
//!
//! ```text
//! Idle -> ListenerStarted -> AwaitingCode -> CodeReceived -> Exchanging -> Done
//!                                         \-> TimedOut -> Failed   \-> Failed
//! ```
//!
//! `Done` and `Failed` are terminal. There are no retry edges; a failed flow is
//! retried by starting a new one.

/// Authorization flow states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowState {
    #[default]
    Idle,
    /// Callback listener bound, browser not yet pointed at the consent page
    ListenerStarted,
    AwaitingCode,
    CodeReceived,
    TimedOut,
    Exchanging,
    Done,
    Failed,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Done | FlowState::Failed)
    }
}

/// Events that drive state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Callback listener bound
    ListenerBound,
    /// Listener could not be bound
    BindFailed,
    /// Consent URL handed to the browser (or printed)
    BrowserDispatched,
    /// Callback delivered an authorization code
    CodeArrived,
    /// Wait window elapsed without a code
    WaitTimedOut,
    /// Callback listener shut down (gracefully or after the grace period)
    ListenerStopped,
    /// Token endpoint issued a token
    TokenIssued,
    /// Token endpoint or transport failed
    ExchangeFailed,
}

/// Actions the authorizer should execute after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// Point the user's browser at the consent URL
    OpenBrowser,
    /// Race the code channel against the authorization timeout
    WaitForCode,
    /// Shut the callback listener down within the grace period
    StopListener,
    /// POST the authorization code to the token endpoint
    ExchangeCode,
    /// Return the token to the caller
    Finish,
    /// Return an error to the caller
    Fail,
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: FlowState, event: FlowEvent) -> (FlowState, FlowAction) {
    use FlowAction as A;
    use FlowEvent as E;
    use FlowState as S;

    match (state, event) {
        (S::Idle, E::ListenerBound) => (S::ListenerStarted, A::OpenBrowser),
        (S::Idle, E::BindFailed) => (S::Failed, A::Fail),

        (S::ListenerStarted, E::BrowserDispatched) => (S::AwaitingCode, A::WaitForCode),

        (S::AwaitingCode, E::CodeArrived) => (S::CodeReceived, A::StopListener),
        (S::AwaitingCode, E::WaitTimedOut) => (S::TimedOut, A::StopListener),

        (S::CodeReceived, E::ListenerStopped) => (S::Exchanging, A::ExchangeCode),
        (S::TimedOut, E::ListenerStopped) => (S::Failed, A::Fail),

        (S::Exchanging, E::TokenIssued) => (S::Done, A::Finish),
        (S::Exchanging, E::ExchangeFailed) => (S::Failed, A::Fail),

        // Invalid/unhandled transition: stay in current state
        (state, _) => (state, A::None),
    }
}
